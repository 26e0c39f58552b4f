//! Layout Property Tests
//!
//! Determinism, completeness, non-overlap, reachability termination,
//! static-size isolation, identity and size-degrade behaviour of the
//! layout core.
//!
//! Run with: cargo test -p kflat-layout --test layout_properties

use kflat_layout::{
    ClassDescriptor, ClassId, ClassRegistry, DeclaredType, FieldDescriptor, FieldRef, HostField,
    LayoutConfig, LayoutError, MethodFacts, MethodRef, PackingPolicy, PrimitiveType,
    ProgramModel, ReachabilityWalker, HANDLE_SIZE,
};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn int() -> DeclaredType {
    PrimitiveType::Int.into()
}

fn method(class: &str, sig: &str) -> MethodRef {
    MethodRef::new(class, sig)
}

fn names(fields: &[&FieldDescriptor]) -> Vec<String> {
    fields.iter().map(|f| f.name().to_string()).collect()
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// A small particle simulation: a kernel that touches a hierarchy of
/// classes, with a call cycle and a cyclic field type graph.
fn particle_program() -> ProgramModel {
    let mut model = ProgramModel::new();
    model
        .declare_class("sim.Object", None)
        .declare_class("sim.Entity", Some("sim.Object"))
        .declare_class("sim.Particle", Some("sim.Entity"))
        .declare_class("sim.Cell", Some("sim.Object"))
        .declare_class("sim.Kernel", Some("sim.Object"))
        .declare_field("sim.Entity", HostField::instance("id", PrimitiveType::Long.into()))
        .declare_field("sim.Entity", HostField::class_level("nextId", PrimitiveType::Long.into()))
        .declare_field("sim.Particle", HostField::instance("x", PrimitiveType::Float.into()))
        .declare_field("sim.Particle", HostField::instance("y", PrimitiveType::Float.into()))
        .declare_field("sim.Particle", HostField::instance("alive", PrimitiveType::Boolean.into()))
        .declare_field("sim.Particle", HostField::instance("cell", DeclaredType::class("sim.Cell")))
        .declare_field("sim.Particle", HostField::instance("unused", PrimitiveType::Double.into()))
        .declare_field("sim.Cell", HostField::instance("first", DeclaredType::class("sim.Particle")))
        .declare_field("sim.Cell", HostField::instance("count", int()))
        .declare_field("sim.Kernel", HostField::instance("particles", DeclaredType::array_of(DeclaredType::class("sim.Particle"))))
        .declare_field("sim.Kernel", HostField::class_level("dt", PrimitiveType::Float.into()))
        .declare_method(
            method("sim.Kernel", "gpuMethod()V"),
            MethodFacts::new()
                .calls(method("sim.Kernel", "step(Lsim/Particle;)V"))
                .accesses(FieldRef::new("sim.Kernel", "particles"))
                .accesses(FieldRef::new("sim.Kernel", "dt")),
        )
        .declare_method(
            method("sim.Kernel", "step(Lsim/Particle;)V"),
            MethodFacts::new()
                .calls(method("sim.Cell", "add(Lsim/Particle;)V"))
                .accesses(FieldRef::new("sim.Particle", "x"))
                .accesses(FieldRef::new("sim.Particle", "y"))
                .accesses(FieldRef::new("sim.Particle", "alive"))
                .accesses(FieldRef::new("sim.Particle", "cell"))
                .accesses(FieldRef::new("sim.Particle", "id")),
        )
        .declare_method(
            method("sim.Cell", "add(Lsim/Particle;)V"),
            MethodFacts::new()
                .calls(method("sim.Kernel", "step(Lsim/Particle;)V"))
                .accesses(FieldRef::new("sim.Cell", "first"))
                .accesses(FieldRef::new("sim.Cell", "count"))
                .uses_array(DeclaredType::array_of(DeclaredType::array_of(int()))),
        );
    model
}

fn walked_registry(model: &ProgramModel) -> ClassRegistry<'_> {
    let mut registry = ClassRegistry::new(model);
    ReachabilityWalker::new(&mut registry, model)
        .walk(&[method("sim.Kernel", "gpuMethod()V")])
        .unwrap();
    registry
}

// =============================================================================
// DETERMINISM
// =============================================================================

mod determinism_tests {
    use super::*;

    #[test]
    fn test_classification_is_stable() {
        let model = particle_program();
        let registry = walked_registry(&model);
        let particle = registry.class_by_name("sim.Particle").unwrap();

        let first = names(&particle.instance_nonref_fields());
        let second = names(&particle.instance_nonref_fields());
        assert_eq!(first, second);
        assert_eq!(first, vec!["x", "y", "alive"]);
    }

    #[test]
    fn test_independent_runs_agree() {
        let model = particle_program();
        let a = walked_registry(&model).finalize().unwrap();
        let b = walked_registry(&model).finalize().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    }

    #[test]
    fn test_registration_order_does_not_matter() {
        let model = particle_program();

        let mut forward = ClassRegistry::new(&model);
        for name in ["x", "y", "alive", "cell"] {
            forward.register_field_access(&FieldRef::new("sim.Particle", name)).unwrap();
        }
        let mut backward = ClassRegistry::new(&model);
        for name in ["cell", "alive", "y", "x"] {
            backward.register_field_access(&FieldRef::new("sim.Particle", name)).unwrap();
        }

        let f = forward.class_by_name("sim.Particle").unwrap();
        let b = backward.class_by_name("sim.Particle").unwrap();
        assert_eq!(names(&f.all_used_instance_fields()), names(&b.all_used_instance_fields()));
    }

    #[test]
    fn test_layout_memoized() {
        let model = particle_program();
        let mut registry = walked_registry(&model);
        registry.classify_all();
        let id = registry.lookup("sim.Particle").unwrap();

        let first = registry.get_offset_calculator(id).unwrap().clone();
        let second = registry.get_offset_calculator(id).unwrap().clone();
        assert_eq!(first, second);
    }
}

// =============================================================================
// COMPLETENESS
// =============================================================================

mod completeness_tests {
    use super::*;

    #[test]
    fn test_instance_buckets_partition_used_fields() {
        let model = particle_program();
        let registry = walked_registry(&model);

        for class in registry.classes() {
            let refs = class.instance_ref_fields();
            let values = class.instance_nonref_fields();
            let all = class.all_used_instance_fields();
            assert_eq!(refs.len() + values.len(), all.len(), "{}", class.host_name());

            let mut seen = HashSet::new();
            for field in refs
                .iter()
                .chain(&values)
                .chain(&class.static_ref_fields())
                .chain(&class.static_nonref_fields())
            {
                assert!(seen.insert(field.name()), "{} appears twice", field.name());
            }
            assert_eq!(seen.len(), class.fields().len());
        }
    }

    #[test]
    fn test_only_used_fields_registered() {
        let model = particle_program();
        let registry = walked_registry(&model);
        let particle = registry.class_by_name("sim.Particle").unwrap();
        assert!(particle.get_field("unused").is_none());
        assert!(particle.get_field("x").is_some());
    }

    #[test]
    fn test_inherited_field_lives_on_declaring_class() {
        let model = particle_program();
        let registry = walked_registry(&model);
        assert!(registry.class_by_name("sim.Particle").unwrap().get_field("id").is_none());
        assert!(registry.class_by_name("sim.Entity").unwrap().get_field("id").is_some());
    }
}

// =============================================================================
// OFFSETS
// =============================================================================

mod offset_tests {
    use super::*;

    #[test]
    fn test_offsets_do_not_overlap() {
        let model = particle_program();
        for config in [
            LayoutConfig::default(),
            LayoutConfig {
                align_fields: false,
                object_alignment: 1,
                ..LayoutConfig::default()
            },
            LayoutConfig {
                object_header_size: 12,
                packing: PackingPolicy::ByName,
                ..LayoutConfig::default()
            },
        ] {
            let mut registry = ClassRegistry::with_config(&model, config);
            ReachabilityWalker::new(&mut registry, &model)
                .walk(&[method("sim.Kernel", "gpuMethod()V")])
                .unwrap();
            registry.classify_all();

            for idx in 0..registry.len() {
                let calc = registry.get_offset_calculator(ClassId::new(idx as u32)).unwrap();
                let fields = calc.field_offsets();
                if let Some(first) = fields.first() {
                    assert!(first.offset >= calc.base_offset());
                }
                for pair in fields.windows(2) {
                    assert!(pair[1].offset >= pair[0].offset + pair[0].size);
                }
                if let Some(last) = fields.last() {
                    assert!(calc.size() >= last.offset + last.size);
                }
            }
        }
    }

    #[test]
    fn test_subclass_fields_follow_ancestors() {
        let model = particle_program();
        let table = walked_registry(&model).finalize().unwrap();

        let entity = table.class("sim.Entity").unwrap();
        let particle = table.class("sim.Particle").unwrap();
        assert_eq!(particle.parent.as_deref(), Some("sim.Entity"));
        // Entity: id@0 (long) -> 8
        assert_eq!(entity.instance_size, 8);
        // Particle: cell@8, x@12, y@16, alive@20 -> 21 -> 24
        assert_eq!(particle.field("cell").unwrap().offset, 8);
        assert_eq!(particle.field("x").unwrap().offset, 12);
        assert_eq!(particle.field("y").unwrap().offset, 16);
        assert_eq!(particle.field("alive").unwrap().offset, 20);
        assert_eq!(particle.instance_size, 24);
        for field in particle.instance_fields() {
            assert!(field.offset >= entity.instance_size);
        }
    }
}

// =============================================================================
// REACHABILITY
// =============================================================================

mod reachability_tests {
    use super::*;

    #[test]
    fn test_two_method_cycle_terminates() {
        let mut model = ProgramModel::new();
        model
            .declare_class("c.A", None)
            .declare_method(method("c.A", "a()V"), MethodFacts::new().calls(method("c.A", "b()V")))
            .declare_method(method("c.A", "b()V"), MethodFacts::new().calls(method("c.A", "a()V")));

        let mut registry = ClassRegistry::new(&model);
        let report = ReachabilityWalker::new(&mut registry, &model)
            .walk(&[method("c.A", "a()V")])
            .unwrap();
        assert_eq!(report.methods, 2);
    }

    #[test]
    fn test_rewalk_changes_nothing() {
        let model = particle_program();
        let mut registry = walked_registry(&model);
        let before = format!("{:?}", registry);
        let fields_before: Vec<usize> = registry.classes().map(|c| c.fields().len()).collect();
        let methods_before = registry.walked_method_count();

        let report = ReachabilityWalker::new(&mut registry, &model)
            .walk(&[method("sim.Kernel", "gpuMethod()V")])
            .unwrap();

        assert!(report.is_empty());
        assert_eq!(format!("{:?}", registry), before);
        let fields_after: Vec<usize> = registry.classes().map(|c| c.fields().len()).collect();
        assert_eq!(fields_before, fields_after);
        assert_eq!(registry.walked_method_count(), methods_before);
    }

    #[test]
    fn test_cyclic_field_types_terminate() {
        let model = particle_program();
        let registry = walked_registry(&model);
        // Particle.cell -> Cell, Cell.first -> Particle
        assert!(registry.lookup("sim.Cell").is_some());
        assert!(registry.lookup("sim.Particle").is_some());
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_array_types_collected() {
        let model = particle_program();
        let registry = walked_registry(&model);
        let arrays: Vec<String> = registry
            .used_array_types()
            .iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(arrays, vec!["sim.Particle[]", "int[][]", "int[]"]);
    }

    #[test]
    fn test_walk_all_classes_after_direct_registration() {
        let model = particle_program();
        let mut registry = ClassRegistry::new(&model);
        registry.register_method(&method("sim.Kernel", "gpuMethod()V")).unwrap();

        let report = ReachabilityWalker::new(&mut registry, &model)
            .walk_all_classes()
            .unwrap();
        assert_eq!(report.methods, 3);
        assert_eq!(registry.used_array_types().len(), 3);

        let again = ReachabilityWalker::new(&mut registry, &model)
            .walk_all_classes()
            .unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_walk_after_freeze_fails() {
        let model = particle_program();
        let mut registry = ClassRegistry::new(&model);
        registry.get_class_descriptor("sim.Particle").unwrap();
        registry.classify_all();

        let err = ReachabilityWalker::new(&mut registry, &model)
            .walk(&[method("sim.Kernel", "gpuMethod()V")])
            .unwrap_err();
        assert!(matches!(err, LayoutError::ClassFrozen { .. }));
    }
}

// =============================================================================
// STATIC SIZE ISOLATION
// =============================================================================

mod static_size_tests {
    use super::*;

    fn mixed_program() -> ProgramModel {
        let mut model = ProgramModel::new();
        model
            .declare_class("s.Mixed", None)
            .declare_field("s.Mixed", HostField::instance("a", int()))
            .declare_field("s.Mixed", HostField::instance("b", DeclaredType::class("s.Mixed")))
            .declare_field("s.Mixed", HostField::class_level("s", int()));
        model
    }

    #[test]
    fn test_static_size_counts_only_statics() {
        let model = mixed_program();
        let mut registry = ClassRegistry::new(&model);
        for name in ["a", "b", "s"] {
            registry.register_field_access(&FieldRef::new("s.Mixed", name)).unwrap();
        }
        registry.classify_all();
        let id = registry.lookup("s.Mixed").unwrap();

        let class = registry.class(id).unwrap();
        assert_eq!(class.calculate_static_field_size(), 4);

        let size = registry.class_size(id);
        assert_eq!(size, 4 + HANDLE_SIZE);
        let calc = registry.cached_offset_calculator(id).unwrap();
        assert_eq!(calc.offset_of("s"), None);
    }

    #[test]
    fn test_static_size_without_statics() {
        let model = mixed_program();
        let mut registry = ClassRegistry::new(&model);
        registry.register_field_access(&FieldRef::new("s.Mixed", "a")).unwrap();
        assert_eq!(registry.class_by_name("s.Mixed").unwrap().calculate_static_field_size(), 0);
    }
}

// =============================================================================
// IDENTITY
// =============================================================================

mod identity_tests {
    use super::*;

    #[test]
    fn test_same_class_equal_regardless_of_fields() {
        let mut a = ClassDescriptor::new(ClassId::new(0), "i.Thing");
        let b = ClassDescriptor::new(ClassId::new(7), "i.Thing");
        a.add_field(HostField::instance("x", int())).unwrap();
        a.add_method(method("i.Thing", "run()V"));

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
    }

    #[test]
    fn test_different_classes_differ() {
        let a = ClassDescriptor::new(ClassId::new(0), "i.Thing");
        let b = ClassDescriptor::new(ClassId::new(0), "i.Other");
        assert_ne!(a, b);
    }
}

// =============================================================================
// SIZE DEGRADE
// =============================================================================

mod degrade_tests {
    use super::*;

    #[test]
    fn test_unlaid_class_size_is_zero() {
        let model = particle_program();
        let mut registry = walked_registry(&model);
        let id = registry.lookup("sim.Particle").unwrap();

        assert!(registry.cached_offset_calculator(id).is_none());
        assert_eq!(registry.class_size(id), 0);
        assert!(registry.try_class_size(id).unwrap_err().is_layout_unavailable());
    }

    #[test]
    fn test_size_available_after_classification() {
        let model = particle_program();
        let mut registry = walked_registry(&model);
        registry.classify_all();
        let id = registry.lookup("sim.Particle").unwrap();
        assert_eq!(registry.class_size(id), 24);
    }
}
