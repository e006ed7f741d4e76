use ferrous_resolve::{Constructor, DiError, Injectable, Lifetime, Resolver, ServiceCollection, ServiceDescriptor};
use std::sync::Arc;

struct ServiceA {
    _b: Arc<ServiceB>,
}

struct ServiceB {
    _a: Arc<ServiceA>,
}

impl Injectable for ServiceA {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|b: Arc<ServiceB>| ServiceA { _b: b })]
    }
}

impl Injectable for ServiceB {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|a: Arc<ServiceA>| ServiceB { _a: a })]
    }
}

#[test]
fn test_two_service_cycle_reports_the_chain() {
    let mut sc = ServiceCollection::new();
    sc.add_transient_type::<ServiceA>();
    sc.add_singleton_type::<ServiceB>();
    let sp = sc.build();

    match sp.get::<ServiceA>() {
        Err(DiError::Circular(path)) => {
            assert_eq!(path.len(), 3);
            assert!(path[0].ends_with("ServiceA"));
            assert!(path[1].ends_with("ServiceB"));
            assert!(path[2].ends_with("ServiceA"));
        }
        other => panic!("expected circular dependency, got {:?}", other.map(|_| ())),
    }

    // the other entry point sees the same cycle from its side
    match sp.get::<ServiceB>() {
        Err(DiError::Circular(path)) => assert!(path[0].ends_with("ServiceB")),
        other => panic!("expected circular dependency, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_self_dependency_is_circular() {
    struct Narcissus;

    impl Injectable for Narcissus {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(|_: Arc<Narcissus>| Narcissus)]
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_scoped_type::<Narcissus>();
    let scope = sc.build().create_scope();

    let err = scope.get::<Narcissus>().err().expect("cycle must be detected");
    assert!(matches!(err, DiError::Circular(ref path) if path.len() == 2));
    assert!(err.to_string().starts_with("Circular dependency:"));
}

#[test]
fn test_cycle_through_a_collection_is_detected() {
    trait Node: Send + Sync {}

    struct Composite;
    impl Node for Composite {}

    impl Injectable for Composite {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(|_: Vec<Arc<dyn Node>>| Composite)]
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_transient_as::<dyn Node, Composite>(|c| c);

    assert!(matches!(sc.build().get::<dyn Node>(), Err(DiError::Circular(_))));
}

#[test]
fn test_factory_reentrancy_is_circular_not_a_stack_overflow() {
    struct Recursive;

    let mut sc = ServiceCollection::new();
    sc.add(ServiceDescriptor::try_factory::<Recursive, _>(Lifetime::Transient, |scope| {
        scope.get::<Recursive>()
    }));
    let sp = sc.build();

    match sp.get::<Recursive>() {
        Err(DiError::Circular(path)) => assert_eq!(path.len(), 2),
        other => panic!("expected circular dependency, got {:?}", other.map(|_| ())),
    }

    // the guard unwinds; a second attempt reports the same error
    assert!(matches!(sp.get::<Recursive>(), Err(DiError::Circular(_))));
}

#[test]
fn test_indirect_factory_reentrancy() {
    struct Ping;
    struct Pong;

    let mut sc = ServiceCollection::new();
    sc.add(ServiceDescriptor::try_factory::<Ping, _>(Lifetime::Singleton, |scope| {
        scope.get::<Pong>()?;
        Ok(Arc::new(Ping))
    }));
    sc.add(ServiceDescriptor::try_factory::<Pong, _>(Lifetime::Scoped, |scope| {
        scope.get::<Ping>()?;
        Ok(Arc::new(Pong))
    }));
    let sp = sc.build();

    match sp.get::<Ping>() {
        Err(DiError::Circular(path)) => {
            assert_eq!(path.len(), 3);
            assert!(path[0].ends_with("Ping"));
            assert!(path[2].ends_with("Ping"));
        }
        other => panic!("expected circular dependency, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_diamond_is_not_a_cycle() {
    struct Leaf;
    struct Left(Arc<Leaf>);
    struct Right(Arc<Leaf>);
    struct Top(Arc<Left>, Arc<Right>);

    impl Injectable for Left {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(Left)]
        }
    }
    impl Injectable for Right {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(Right)]
        }
    }
    impl Injectable for Top {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(Top)]
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_singleton(Leaf);
    sc.add_transient_type::<Left>();
    sc.add_transient_type::<Right>();
    sc.add_transient_type::<Top>();

    let top = sc.build().get_required::<Top>();
    assert!(Arc::ptr_eq(&top.0 .0, &top.1 .0));
}

#[test]
fn test_validate_reports_cycles_up_front() {
    let mut sc = ServiceCollection::new();
    sc.add_transient_type::<ServiceA>();
    sc.add_transient_type::<ServiceB>();
    let sp = sc.build();

    match sp.validate() {
        Err(DiError::Validation(errors)) => {
            assert_eq!(errors.len(), 2);
            assert!(errors.iter().all(|e| matches!(e, DiError::Circular(_))));
        }
        other => panic!("expected validation failure, got {:?}", other),
    }
}
