//! End-to-end staging tests: declaration ordering, module shape rules,
//! forward declarations, and freezing.

use wasmith_module::{Export, FuncDecl, ModuleBuilder};
use wasmith_types::{BuildError, Node, ValueType};

#[test]
fn param_after_local_rejected() {
    let mut m = ModuleBuilder::new();
    let err = m
        .func(ValueType::Void, |f| {
            f.local(ValueType::I32)?;
            f.param(ValueType::I32)?;
            Ok(())
        })
        .unwrap_err();
    assert_eq!(err, BuildError::ParamAfterLocal);
}

#[test]
fn local_after_statement_rejected() {
    let mut m = ModuleBuilder::new();
    let err = m
        .func(ValueType::Void, |f| {
            f.push(Node::drop(Node::i32(1))?)?;
            f.local(ValueType::I32)?;
            Ok(())
        })
        .unwrap_err();
    assert_eq!(err, BuildError::LocalAfterStatement);
}

#[test]
fn void_parameters_rejected_everywhere() {
    // Slice-form signatures get the same check as FuncBuilder::param, so a
    // void slot can never reach the encoder's type tags.
    let mut m = ModuleBuilder::new();
    assert_eq!(
        m.import_func("env", "f", ValueType::I32, &[ValueType::Void])
            .unwrap_err(),
        BuildError::VoidLocal
    );
    assert_eq!(
        m.forward_decl(ValueType::Void, &[ValueType::I32, ValueType::Void])
            .unwrap_err(),
        BuildError::VoidLocal
    );
    let t = m.table(1, None).unwrap();
    let err = m
        .func(ValueType::Void, |f| {
            let call = f.call_indirect(
                t,
                ValueType::Void,
                &[ValueType::Void],
                Node::i32(0),
                vec![Node::i32(1)],
            )?;
            f.push(call)
        })
        .unwrap_err();
    assert_eq!(err, BuildError::VoidLocal);
    assert_eq!(
        m.func(ValueType::Void, |f| {
            f.param(ValueType::Void)?;
            Ok(())
        })
        .unwrap_err(),
        BuildError::VoidLocal
    );
}

#[test]
fn return_type_checked() {
    let mut m = ModuleBuilder::new();
    let err = m
        .func(ValueType::I64, |f| f.ret(Node::i32(1)))
        .unwrap_err();
    assert_eq!(
        err,
        BuildError::ReturnTypeMismatch {
            expected: ValueType::I64,
            found: ValueType::I32,
        }
    );
    // Bare return only in void functions.
    let err = m.func(ValueType::I32, |f| f.ret_void()).unwrap_err();
    assert!(matches!(err, BuildError::ReturnTypeMismatch { .. }));
}

#[test]
fn import_after_definition_rejected() {
    let mut m = ModuleBuilder::new();
    m.func(ValueType::Void, |_| Ok(())).unwrap();
    let err = m
        .import_func("env", "log", ValueType::Void, &[ValueType::I32])
        .unwrap_err();
    assert_eq!(err, BuildError::ImportAfterDefinition);

    let mut m = ModuleBuilder::new();
    m.global(true, Node::i32(0)).unwrap();
    let err = m
        .import_global("env", "g", ValueType::I32, false)
        .unwrap_err();
    assert_eq!(err, BuildError::ImportAfterDefinition);
}

#[test]
fn at_most_one_memory_and_table() {
    let mut m = ModuleBuilder::new();
    m.memory(1, None).unwrap();
    assert_eq!(m.memory(1, None).unwrap_err(), BuildError::MultipleMemories);

    // The rule also spans the import/local split.
    let mut m = ModuleBuilder::new();
    m.import_memory("env", "mem", 1, Some(4)).unwrap();
    assert_eq!(m.memory(1, None).unwrap_err(), BuildError::MultipleMemories);

    let mut m = ModuleBuilder::new();
    m.table(2, None).unwrap();
    assert_eq!(
        m.import_table("env", "tab", 2, None).unwrap_err(),
        BuildError::MultipleTables
    );
}

#[test]
fn duplicate_export_rejected() {
    let mut m = ModuleBuilder::new();
    let f = m.func(ValueType::Void, |_| Ok(())).unwrap();
    m.export_func("main", &f).unwrap();
    assert_eq!(
        m.export_func("main", &f).unwrap_err(),
        BuildError::DuplicateExport("main".into())
    );
    // Uniqueness is per name across kinds, not per kind.
    m.memory(1, None).unwrap();
    assert_eq!(
        m.export_memory("main").unwrap_err(),
        BuildError::DuplicateExport("main".into())
    );
}

#[test]
fn export_without_target_rejected() {
    let mut m = ModuleBuilder::new();
    assert!(matches!(
        m.export_memory("mem"),
        Err(BuildError::ExportTargetMissing(_))
    ));
    assert!(matches!(
        m.export_table("tab"),
        Err(BuildError::ExportTargetMissing(_))
    ));
}

#[test]
fn start_rules() {
    let mut m = ModuleBuilder::new();
    let init = m.func(ValueType::Void, |_| Ok(())).unwrap();
    let takes_arg = m
        .func(ValueType::Void, |f| {
            f.param(ValueType::I32)?;
            Ok(())
        })
        .unwrap();
    assert_eq!(m.start(&takes_arg).unwrap_err(), BuildError::StartSignature);
    m.start(&init).unwrap();
    assert_eq!(m.start(&init).unwrap_err(), BuildError::DuplicateStart);
}

#[test]
fn segments_need_their_stores() {
    let mut m = ModuleBuilder::new();
    assert_eq!(
        m.active_data(Node::i32(0), b"hi").unwrap_err(),
        BuildError::DataWithoutMemory
    );
    m.memory(1, None).unwrap();
    assert_eq!(
        m.active_data(Node::i64(0), b"hi").unwrap_err(),
        BuildError::OffsetType(ValueType::I64)
    );
    m.active_data(Node::i32(0), b"hi").unwrap();
    assert_eq!(m.passive_data(b"later").unwrap(), 1);
}

#[test]
fn elements_need_a_table() {
    let mut m = ModuleBuilder::new();
    let f = m.func(ValueType::Void, |_| Ok(())).unwrap();
    let t = m.table(1, None).unwrap();

    let mut bare = ModuleBuilder::new();
    let g = bare.func(ValueType::Void, |_| Ok(())).unwrap();
    assert_eq!(
        bare.elem(t, Node::i32(0), &[g]).unwrap_err(),
        BuildError::ElementWithoutTable
    );

    m.elem(t, Node::i32(0), &[f]).unwrap();
}

#[test]
fn forward_declarations_must_be_implemented() {
    let mut m = ModuleBuilder::new();
    let fwd = m.forward_decl(ValueType::I32, &[ValueType::I32]).unwrap();
    assert_eq!(
        m.build().unwrap_err(),
        BuildError::UnimplementedFunction(fwd.index)
    );
}

#[test]
fn forward_declaration_round_trip() {
    let mut m = ModuleBuilder::new();
    let fwd = m.forward_decl(ValueType::I32, &[ValueType::I32]).unwrap();
    // The reserved index is callable before the body exists.
    let caller = m
        .func(ValueType::I32, |f| {
            let n = f.param(ValueType::I32)?;
            f.ret(Node::call(&fwd, vec![Node::local_get(n)])?)
        })
        .unwrap();
    m.implement(&fwd, |f| {
        let n = f.param(ValueType::I32)?;
        f.ret(Node::local_get(n).add(Node::i32(1))?)
    })
    .unwrap();
    // A body may be supplied only once.
    assert_eq!(
        m.implement(&fwd, |f| {
            f.param(ValueType::I32)?;
            f.ret(Node::i32(0))
        })
        .unwrap_err(),
        BuildError::AlreadyImplemented(fwd.index)
    );
    let module = m.build().unwrap();
    assert_eq!(module.funcs.len(), 2);
    assert!(matches!(module.funcs[fwd.index as usize], FuncDecl::Local(_)));
    assert!(matches!(
        module.funcs[caller.index as usize],
        FuncDecl::Local(_)
    ));
}

#[test]
fn implementation_signature_must_match() {
    let mut m = ModuleBuilder::new();
    let fwd = m.forward_decl(ValueType::I32, &[ValueType::I32]).unwrap();
    let err = m
        .implement(&fwd, |f| {
            f.param(ValueType::I64)?;
            f.ret(Node::i32(0))
        })
        .unwrap_err();
    assert_eq!(err, BuildError::SignatureMismatch);
}

#[test]
fn types_are_deduplicated() {
    let mut m = ModuleBuilder::new();
    m.func(ValueType::I32, |f| {
        f.param(ValueType::I32)?;
        f.ret(Node::i32(0))
    })
    .unwrap();
    m.func(ValueType::I32, |f| {
        f.param(ValueType::I32)?;
        f.ret(Node::i32(1))
    })
    .unwrap();
    m.func(ValueType::Void, |_| Ok(())).unwrap();
    let module = m.build().unwrap();
    assert_eq!(module.types.len(), 2);
}

#[test]
fn frozen_module_shape() {
    let mut m = ModuleBuilder::new();
    let log = m
        .import_func("env", "log", ValueType::Void, &[ValueType::I32])
        .unwrap();
    let main = m
        .func(ValueType::Void, |f| {
            f.push(Node::call(&log, vec![Node::i32(42)])?)
        })
        .unwrap();
    m.memory(1, Some(4)).unwrap();
    let g = m.global(true, Node::i32(7)).unwrap();
    m.export_func("main", &main).unwrap();
    m.export_global("counter", g).unwrap();
    m.export_memory("mem").unwrap();
    let module = m.build().unwrap();

    assert_eq!(module.imported_func_count(), 1);
    assert_eq!(module.local_funcs().count(), 1);
    assert_eq!(module.export("main"), Some(Export::Func(main.index)));
    assert_eq!(module.export("counter"), Some(Export::Global(0)));
    assert_eq!(module.export("mem"), Some(Export::Memory));
    assert_eq!(module.export("absent"), None);
    assert_eq!(module.func_type(main.index).result, ValueType::Void);
    assert_eq!(module.memory.as_ref().map(|d| d.limits().min), Some(1));
}
