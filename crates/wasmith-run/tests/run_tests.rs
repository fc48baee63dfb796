//! End-to-end runtime tests: instantiation order, both execution paths,
//! imports, memory, tables, and trap behavior.

use std::cell::RefCell;
use std::rc::Rc;

use wasmith_module::{Module, ModuleBuilder};
use wasmith_run::{Imports, Instance, Trap};
use wasmith_types::{LoadOp, Node, NumericTrap, StoreOp, Value, ValueType};

fn instantiate(module: &Module) -> Instance<'_> {
    Instance::instantiate(module, Imports::new()).expect("instantiation")
}

#[test]
fn memory_size_reflects_declaration() {
    for (pages, expected) in [(0u32, 0i32), (1, 1), (3, 3)] {
        let mut b = ModuleBuilder::new();
        b.memory(pages, None).unwrap();
        let f = b
            .func(ValueType::I32, |f| f.ret(Node::memory_size()))
            .unwrap();
        b.export_func("size", &f).unwrap();
        let module = b.build().unwrap();
        let mut inst = instantiate(&module);
        assert_eq!(inst.invoke("size", vec![]).unwrap(), Some(Value::I32(expected)));
        assert_eq!(
            inst.invoke_direct("size", vec![]).unwrap(),
            Some(Value::I32(expected))
        );
    }
}

#[test]
fn active_data_segments_are_applied() {
    let mut b = ModuleBuilder::new();
    b.memory(1, None).unwrap();
    b.active_data(Node::i32(0), b"ABC\xA7D").unwrap();
    b.active_data(Node::i32(20), b"WASM").unwrap();
    let byte_at = b
        .func(ValueType::I32, |f| {
            let addr = f.param(ValueType::I32)?;
            f.ret(Node::load(LoadOp::I32U8, Node::local_get(addr))?)
        })
        .unwrap();
    b.export_func("byte_at", &byte_at).unwrap();
    let module = b.build().unwrap();
    let mut inst = instantiate(&module);

    for (addr, expected) in [(0, 65), (3, 167), (4, 68), (20, 87), (24, 0)] {
        assert_eq!(
            inst.invoke("byte_at", vec![Value::I32(addr)]).unwrap(),
            Some(Value::I32(expected)),
            "byte at {addr}"
        );
        assert_eq!(
            inst.invoke_direct("byte_at", vec![Value::I32(addr)]).unwrap(),
            Some(Value::I32(expected))
        );
    }
}

#[test]
fn passive_data_is_not_applied() {
    let mut b = ModuleBuilder::new();
    b.memory(1, None).unwrap();
    b.passive_data(b"later").unwrap();
    let module = b.build().unwrap();
    let inst = instantiate(&module);
    assert!(inst.memory()[..16].iter().all(|&b| b == 0));
}

#[test]
fn oversized_data_segment_fails_instantiation() {
    let mut b = ModuleBuilder::new();
    b.memory(0, None).unwrap();
    b.active_data(Node::i32(0), b"x").unwrap();
    let module = b.build().unwrap();
    assert_eq!(
        Instance::instantiate(&module, Imports::new()).err(),
        Some(Trap::DataOutOfBounds)
    );
}

#[test]
fn both_paths_agree_on_mixed_arithmetic() {
    let mut b = ModuleBuilder::new();
    // f(n) = sum over i in 0..n of (i*i - 3) folded through i64 and f64.
    let f = b
        .func(ValueType::F64, |f| {
            let n = f.param(ValueType::I32)?;
            let acc = f.local(ValueType::I64)?;
            let i = f.local(ValueType::I32)?;
            f.push(Node::for_range(
                i,
                Node::i32(0),
                Node::local_get(n),
                vec![Node::local_set(
                    acc,
                    Node::local_get(acc).add(
                        Node::local_get(i)
                            .mul(Node::local_get(i))?
                            .sub(Node::i32(3))?
                            .to_i64()?,
                    )?,
                )?],
            )?)?;
            f.push(Node::if_else(
                Node::local_get(acc).lt(Node::i64(0))?,
                vec![Node::return_(Some(Node::local_get(acc).neg()?.to_f64()?))],
                vec![],
            )?)?;
            f.ret(Node::local_get(acc).to_f64()?.mul(Node::f64(0.5))?)
        })
        .unwrap();
    b.export_func("fold", &f).unwrap();
    let module = b.build().unwrap();
    let mut inst = instantiate(&module);

    for n in [0, 1, 2, 5, 17, 100] {
        let a = inst.invoke("fold", vec![Value::I32(n)]).unwrap();
        let d = inst.invoke_direct("fold", vec![Value::I32(n)]).unwrap();
        assert_eq!(a, d, "paths diverge at n={n}");
    }
}

#[test]
fn loop_bound_is_reevaluated_and_counter_is_writable() {
    let mut b = ModuleBuilder::new();
    // The body advances the counter itself, so iteration steps by two.
    let f = b
        .func(ValueType::I32, |f| {
            let n = f.param(ValueType::I32)?;
            let count = f.local(ValueType::I32)?;
            let i = f.local(ValueType::I32)?;
            f.push(Node::for_range(
                i,
                Node::i32(0),
                Node::local_get(n),
                vec![
                    Node::local_set(count, Node::local_get(count).add(Node::i32(1))?)?,
                    Node::local_set(i, Node::local_get(i).add(Node::i32(1))?)?,
                ],
            )?)?;
            f.ret(Node::local_get(count))
        })
        .unwrap();
    b.export_func("halves", &f).unwrap();
    let module = b.build().unwrap();
    let mut inst = instantiate(&module);
    for n in [0, 1, 2, 7, 10] {
        let expected = Some(Value::I32((n + 1) / 2));
        assert_eq!(inst.invoke("halves", vec![Value::I32(n)]).unwrap(), expected);
        assert_eq!(
            inst.invoke_direct("halves", vec![Value::I32(n)]).unwrap(),
            expected
        );
    }
}

#[test]
fn start_runs_once_and_can_touch_state() {
    let mut b = ModuleBuilder::new();
    let ticks = b.global(true, Node::i32(0)).unwrap();
    let init = b
        .func(ValueType::Void, |f| {
            f.push(Node::global_set(
                ticks,
                Node::global_get(ticks).add(Node::i32(1))?,
            )?)
        })
        .unwrap();
    b.start(&init).unwrap();
    b.export_global("ticks", ticks).unwrap();
    let module = b.build().unwrap();
    let inst = instantiate(&module);
    assert_eq!(inst.global_value("ticks").unwrap(), Value::I32(1));
}

#[test]
fn host_functions_receive_and_return_values() {
    let mut b = ModuleBuilder::new();
    let log = b
        .import_func("env", "log", ValueType::Void, &[ValueType::I32])
        .unwrap();
    let seed = b.import_func("env", "seed", ValueType::I32, &[]).unwrap();
    let main = b
        .func(ValueType::I32, |f| {
            let i = f.local(ValueType::I32)?;
            f.push(Node::for_range(
                i,
                Node::i32(0),
                Node::i32(3),
                vec![Node::call(&log, vec![Node::local_get(i).mul(Node::i32(10))?])?],
            )?)?;
            f.ret(Node::call(&seed, vec![])?.add(Node::i32(1))?)
        })
        .unwrap();
    b.export_func("main", &main).unwrap();
    let module = b.build().unwrap();

    let logged = Rc::new(RefCell::new(Vec::new()));
    let sink = logged.clone();
    let imports = Imports::new()
        .func("env", "log", move |args| {
            if let [Value::I32(v)] = args {
                sink.borrow_mut().push(*v);
            }
            Ok(None)
        })
        .func("env", "seed", |_| Ok(Some(Value::I32(41))));
    let mut inst = Instance::instantiate(&module, imports).unwrap();
    assert_eq!(inst.invoke("main", vec![]).unwrap(), Some(Value::I32(42)));
    assert_eq!(*logged.borrow(), [0, 10, 20]);

    logged.borrow_mut().clear();
    assert_eq!(inst.invoke_direct("main", vec![]).unwrap(), Some(Value::I32(42)));
    assert_eq!(*logged.borrow(), [0, 10, 20]);
}

#[test]
fn host_faults_propagate() {
    let mut b = ModuleBuilder::new();
    let fail = b.import_func("env", "fail", ValueType::Void, &[]).unwrap();
    let main = b
        .func(ValueType::Void, |f| f.push(Node::call(&fail, vec![])?))
        .unwrap();
    b.export_func("main", &main).unwrap();
    let module = b.build().unwrap();
    let imports = Imports::new().func("env", "fail", |_| Err(Trap::Host("boom".into())));
    let mut inst = Instance::instantiate(&module, imports).unwrap();
    assert_eq!(
        inst.invoke("main", vec![]).err(),
        Some(Trap::Host("boom".into()))
    );
}

#[test]
fn missing_and_mismatched_imports_fail_linking() {
    let mut b = ModuleBuilder::new();
    b.import_func("env", "log", ValueType::Void, &[ValueType::I32])
        .unwrap();
    let module = b.build().unwrap();
    assert!(matches!(
        Instance::instantiate(&module, Imports::new()),
        Err(Trap::MissingImport { .. })
    ));
    let imports = Imports::new().global("env", "log", Value::I32(1));
    assert!(matches!(
        Instance::instantiate(&module, imports),
        Err(Trap::ImportMismatch { .. })
    ));
}

#[test]
fn globals_initialize_in_order_and_mutate() {
    let mut b = ModuleBuilder::new();
    let base = b
        .import_global("env", "base", ValueType::I32, false)
        .unwrap();
    let counter = b
        .global(true, Node::global_get(base).add(Node::i32(1)).unwrap())
        .unwrap();
    let bump = b
        .func(ValueType::I32, |f| {
            f.push(Node::global_set(
                counter,
                Node::global_get(counter).add(Node::i32(1))?,
            )?)?;
            f.ret(Node::global_get(counter))
        })
        .unwrap();
    b.export_func("bump", &bump).unwrap();
    b.export_global("counter", counter).unwrap();
    let module = b.build().unwrap();

    let imports = Imports::new().global("env", "base", Value::I32(10));
    let mut inst = Instance::instantiate(&module, imports).unwrap();
    assert_eq!(inst.global_value("counter").unwrap(), Value::I32(11));
    assert_eq!(inst.invoke("bump", vec![]).unwrap(), Some(Value::I32(12)));
    assert_eq!(inst.invoke_direct("bump", vec![]).unwrap(), Some(Value::I32(13)));
    assert_eq!(inst.global_value("counter").unwrap(), Value::I32(13));
}

#[test]
fn memory_grow_and_limits() {
    let mut b = ModuleBuilder::new();
    b.memory(1, Some(2)).unwrap();
    let grow = b
        .func(ValueType::I32, |f| {
            let d = f.param(ValueType::I32)?;
            f.ret(Node::memory_grow(Node::local_get(d))?)
        })
        .unwrap();
    let size = b
        .func(ValueType::I32, |f| f.ret(Node::memory_size()))
        .unwrap();
    b.export_func("grow", &grow).unwrap();
    b.export_func("size", &size).unwrap();
    let module = b.build().unwrap();
    let mut inst = instantiate(&module);

    assert_eq!(inst.invoke("grow", vec![Value::I32(1)]).unwrap(), Some(Value::I32(1)));
    assert_eq!(inst.invoke("size", vec![]).unwrap(), Some(Value::I32(2)));
    // Beyond the declared maximum.
    assert_eq!(inst.invoke("grow", vec![Value::I32(1)]).unwrap(), Some(Value::I32(-1)));
}

#[test]
fn loads_and_stores_round_trip_values() {
    let mut b = ModuleBuilder::new();
    b.memory(1, None).unwrap();
    let put = b
        .func(ValueType::Void, |f| {
            let addr = f.param(ValueType::I32)?;
            let v = f.param(ValueType::F64)?;
            f.push(Node::store(
                StoreOp::F64,
                Node::local_get(addr),
                Node::local_get(v),
            )?)
        })
        .unwrap();
    let get = b
        .func(ValueType::F64, |f| {
            let addr = f.param(ValueType::I32)?;
            f.ret(Node::load(LoadOp::F64, Node::local_get(addr))?)
        })
        .unwrap();
    b.export_func("put", &put).unwrap();
    b.export_func("get", &get).unwrap();
    let module = b.build().unwrap();
    let mut inst = instantiate(&module);

    inst.invoke("put", vec![Value::I32(8), Value::F64(2.75)]).unwrap();
    assert_eq!(inst.invoke("get", vec![Value::I32(8)]).unwrap(), Some(Value::F64(2.75)));
    assert_eq!(
        inst.invoke_direct("get", vec![Value::I32(8)]).unwrap(),
        Some(Value::F64(2.75))
    );
}

#[test]
fn numeric_and_memory_traps() {
    let mut b = ModuleBuilder::new();
    b.memory(1, None).unwrap();
    let div = b
        .func(ValueType::I32, |f| {
            let a = f.param(ValueType::I32)?;
            let d = f.param(ValueType::I32)?;
            f.ret(Node::local_get(a).div(Node::local_get(d))?)
        })
        .unwrap();
    let peek = b
        .func(ValueType::I32, |f| {
            let addr = f.param(ValueType::I32)?;
            f.ret(Node::load(LoadOp::I32, Node::local_get(addr))?)
        })
        .unwrap();
    let narrow = b
        .func(ValueType::I32, |f| {
            let x = f.param(ValueType::F64)?;
            f.ret(Node::local_get(x).to_i32()?)
        })
        .unwrap();
    b.export_func("div", &div).unwrap();
    b.export_func("peek", &peek).unwrap();
    b.export_func("narrow", &narrow).unwrap();
    let module = b.build().unwrap();
    let mut inst = instantiate(&module);

    assert_eq!(
        inst.invoke("div", vec![Value::I32(1), Value::I32(0)]).err(),
        Some(Trap::Numeric(NumericTrap::DivideByZero))
    );
    assert_eq!(
        inst.invoke("div", vec![Value::I32(i32::MIN), Value::I32(-1)]).err(),
        Some(Trap::Numeric(NumericTrap::IntegerOverflow))
    );
    assert!(matches!(
        inst.invoke("peek", vec![Value::I32(65533)]).err(),
        Some(Trap::MemoryOutOfBounds { .. })
    ));
    assert_eq!(
        inst.invoke("narrow", vec![Value::F64(3e10)]).err(),
        Some(Trap::Numeric(NumericTrap::InvalidConversion))
    );
    // The tree path reports the same faults.
    assert_eq!(
        inst.invoke_direct("div", vec![Value::I32(1), Value::I32(0)]).err(),
        Some(Trap::Numeric(NumericTrap::DivideByZero))
    );
}

#[test]
fn indirect_calls_dispatch_and_check_signatures() {
    let mut b = ModuleBuilder::new();
    let add1 = b
        .func(ValueType::I32, |f| {
            let x = f.param(ValueType::I32)?;
            f.ret(Node::local_get(x).add(Node::i32(1))?)
        })
        .unwrap();
    let double = b
        .func(ValueType::I32, |f| {
            let x = f.param(ValueType::I32)?;
            f.ret(Node::local_get(x).mul(Node::i32(2))?)
        })
        .unwrap();
    let wrong = b
        .func(ValueType::I64, |f| f.ret(Node::i64(0)))
        .unwrap();
    let t = b.table(4, None).unwrap();
    b.elem(t, Node::i32(0), &[add1, double, wrong]).unwrap();
    let dispatch = b
        .func(ValueType::I32, |fb| {
            let slot = fb.param(ValueType::I32)?;
            let x = fb.param(ValueType::I32)?;
            let call = fb.call_indirect(
                t,
                ValueType::I32,
                &[ValueType::I32],
                Node::local_get(slot),
                vec![Node::local_get(x)],
            )?;
            fb.ret(call)
        })
        .unwrap();
    b.export_func("dispatch", &dispatch).unwrap();
    let module = b.build().unwrap();
    let mut inst = instantiate(&module);

    assert_eq!(
        inst.invoke("dispatch", vec![Value::I32(0), Value::I32(10)]).unwrap(),
        Some(Value::I32(11))
    );
    assert_eq!(
        inst.invoke("dispatch", vec![Value::I32(1), Value::I32(10)]).unwrap(),
        Some(Value::I32(20))
    );
    assert_eq!(
        inst.invoke_direct("dispatch", vec![Value::I32(1), Value::I32(10)]).unwrap(),
        Some(Value::I32(20))
    );
    assert_eq!(
        inst.invoke("dispatch", vec![Value::I32(2), Value::I32(10)]).err(),
        Some(Trap::IndirectSignatureMismatch)
    );
    assert_eq!(
        inst.invoke("dispatch", vec![Value::I32(3), Value::I32(10)]).err(),
        Some(Trap::UninitializedElement(3))
    );
    assert_eq!(
        inst.invoke("dispatch", vec![Value::I32(9), Value::I32(10)]).err(),
        Some(Trap::TableOutOfBounds(9))
    );
}

#[test]
fn recursion_through_forward_declarations() {
    let mut b = ModuleBuilder::new();
    let fact = b.forward_decl(ValueType::I64, &[ValueType::I64]).unwrap();
    b.implement(&fact, |f| {
        let n = f.param(ValueType::I64)?;
        f.push(Node::if_stmt(
            Node::local_get(n).le(Node::i64(1))?,
            vec![Node::return_(Some(Node::i64(1)))],
        )?)?;
        f.ret(Node::local_get(n).mul(Node::call(
            &fact,
            vec![Node::local_get(n).sub(Node::i64(1))?],
        )?)?)
    })
    .unwrap();
    b.export_func("fact", &fact).unwrap();
    let module = b.build().unwrap();
    let mut inst = instantiate(&module);

    assert_eq!(
        inst.invoke("fact", vec![Value::I64(10)]).unwrap(),
        Some(Value::I64(3_628_800))
    );
    assert_eq!(
        inst.invoke_direct("fact", vec![Value::I64(10)]).unwrap(),
        Some(Value::I64(3_628_800))
    );
}

#[test]
fn runaway_recursion_is_a_trap_not_a_crash() {
    let mut b = ModuleBuilder::new();
    let f = b.forward_decl(ValueType::Void, &[]).unwrap();
    b.implement(&f, |fb| fb.push(Node::call(&f, vec![])?))
        .unwrap();
    b.export_func("spin", &f).unwrap();
    let module = b.build().unwrap();
    let mut inst = instantiate(&module);
    assert_eq!(inst.invoke("spin", vec![]).err(), Some(Trap::StackOverflow));
    assert_eq!(inst.invoke_direct("spin", vec![]).err(), Some(Trap::StackOverflow));
}

#[test]
fn bool_results_cross_the_boundary_as_i32() {
    let mut b = ModuleBuilder::new();
    let odd = b
        .func(ValueType::Bool, |f| {
            let n = f.param(ValueType::I32)?;
            f.ret(Node::local_get(n).and(Node::i32(1))?.eq(Node::i32(1))?)
        })
        .unwrap();
    b.export_func("odd", &odd).unwrap();
    let module = b.build().unwrap();
    let mut inst = instantiate(&module);
    assert_eq!(inst.invoke("odd", vec![Value::I32(7)]).unwrap(), Some(Value::I32(1)));
    assert_eq!(inst.invoke("odd", vec![Value::I32(8)]).unwrap(), Some(Value::I32(0)));
}

#[test]
fn invocation_surface_checks() {
    let mut b = ModuleBuilder::new();
    let add = b
        .func(ValueType::I32, |f| {
            let a = f.param(ValueType::I32)?;
            let x = f.param(ValueType::I32)?;
            f.ret(Node::local_get(a).add(Node::local_get(x))?)
        })
        .unwrap();
    b.export_func("add", &add).unwrap();
    b.memory(1, None).unwrap();
    b.export_memory("mem").unwrap();
    let module = b.build().unwrap();
    let mut inst = instantiate(&module);

    assert_eq!(
        inst.invoke("absent", vec![]).err(),
        Some(Trap::UnknownExport("absent".into()))
    );
    assert_eq!(
        inst.invoke("mem", vec![]).err(),
        Some(Trap::NotCallable("mem".into()))
    );
    // Kind mismatches on the global surface are reported as such, not as a
    // missing export.
    assert_eq!(
        inst.global_value("add").err(),
        Some(Trap::NotAGlobal("add".into()))
    );
    assert_eq!(
        inst.global_value("absent").err(),
        Some(Trap::UnknownExport("absent".into()))
    );
    assert_eq!(
        inst.invoke("add", vec![Value::I32(1)]).err(),
        Some(Trap::ArgCount {
            expected: 2,
            found: 1
        })
    );
    assert_eq!(
        inst.invoke("add", vec![Value::I32(1), Value::F64(2.0)]).err(),
        Some(Trap::ArgType { index: 1 })
    );
    assert_eq!(
        inst.invoke("add", vec![Value::I32(1), Value::I32(2)]).unwrap(),
        Some(Value::I32(3))
    );
}
