use ferrous_resolve::{
    Constructor, Injectable, Key, PromotionPolicy, ProviderOptions, ResolutionListener, Resolver, ResolverMode,
    ResolverStrategy, ServiceCollection, ServiceProvider,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Settings {
    name: &'static str,
}

struct Session {
    id: usize,
}

struct Service {
    settings: Arc<Settings>,
    session: Arc<Session>,
    stamp: usize,
}

static STAMPS: AtomicUsize = AtomicUsize::new(0);

impl Injectable for Service {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|settings: Arc<Settings>, session: Arc<Session>| Service {
            settings,
            session,
            stamp: STAMPS.fetch_add(1, Ordering::SeqCst),
        })]
    }
}

fn services() -> ServiceCollection {
    let sessions = Arc::new(AtomicUsize::new(0));
    let mut sc = ServiceCollection::new();
    sc.add_singleton(Settings { name: "prod" });
    sc.add_scoped_factory::<Session, _>(move |_| Session {
        id: sessions.fetch_add(1, Ordering::SeqCst),
    });
    sc.add_transient_type::<Service>();
    sc
}

fn inline(mode: ResolverMode) -> ProviderOptions {
    ProviderOptions::default().with_mode(mode).with_promotion(PromotionPolicy {
        threshold: 2,
        background: false,
    })
}

#[test]
fn test_adaptive_results_are_invariant_across_tiers() {
    let sp = services().build_with_options(inline(ResolverMode::Adaptive)).unwrap();
    let scope = sp.create_scope();

    let first = scope.get_required::<Service>();
    assert_eq!(sp.strategy::<Service>(), Some(ResolverStrategy::Interpreted));
    let second = scope.get_required::<Service>();
    let third = scope.get_required::<Service>();
    assert_ne!(sp.strategy::<Service>(), Some(ResolverStrategy::Interpreted));

    for service in [&first, &second, &third] {
        assert_eq!(service.settings.name, "prod");
        assert!(Arc::ptr_eq(&service.settings, &first.settings));
        assert!(Arc::ptr_eq(&service.session, &first.session));
    }
    assert!(first.stamp < second.stamp && second.stamp < third.stamp);

    // the promoted path still separates scopes
    let other = sp.create_scope().get_required::<Service>();
    assert!(!Arc::ptr_eq(&other.session, &first.session));
    assert!(Arc::ptr_eq(&other.settings, &first.settings));
}

#[test]
fn test_promotion_after_threshold() {
    let options = ProviderOptions::default()
        .with_mode(ResolverMode::Adaptive)
        .with_promotion(PromotionPolicy {
            threshold: 5,
            background: false,
        });
    let sp = services().build_with_options(options).unwrap();

    assert_eq!(sp.strategy::<Settings>(), None);
    for _ in 0..4 {
        sp.get_required::<Settings>();
        assert_eq!(sp.strategy::<Settings>(), Some(ResolverStrategy::Interpreted));
    }
    sp.get_required::<Settings>();
    assert_eq!(sp.strategy::<Settings>(), Some(ResolverStrategy::Specialized));
}

#[test]
fn test_background_promotion_eventually_installs() {
    let sp = services().build();
    let scope = sp.create_scope();

    let first = scope.get_required::<Service>();
    scope.get_required::<Service>();

    let deadline = Instant::now() + Duration::from_secs(5);
    while sp.strategy::<Service>() == Some(ResolverStrategy::Interpreted) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(sp.strategy::<Service>(), Some(ResolverStrategy::Specialized));

    let later = scope.get_required::<Service>();
    assert!(Arc::ptr_eq(&later.session, &first.session));
}

#[test]
fn test_compiled_mode_builds_the_fast_path_up_front() {
    let sp = services().build_with_options(inline(ResolverMode::Compiled)).unwrap();
    let scope = sp.create_scope();

    scope.get_required::<Service>();
    assert_eq!(sp.strategy::<Service>(), Some(ResolverStrategy::Specialized));

    let options = inline(ResolverMode::Compiled).with_specialization(false, 64);
    let sp = services().build_with_options(options).unwrap();
    let scope = sp.create_scope();

    let a = scope.get_required::<Service>();
    let b = scope.get_required::<Service>();
    assert_eq!(sp.strategy::<Service>(), Some(ResolverStrategy::Compiled));
    assert!(Arc::ptr_eq(&a.session, &b.session));
    assert!(!Arc::ptr_eq(&a, &b));
}

#[test]
fn test_interpreted_mode_never_promotes() {
    let sp = services().build_with_options(inline(ResolverMode::Interpreted)).unwrap();
    for _ in 0..10 {
        sp.get_required::<Settings>();
    }
    assert_eq!(sp.strategy::<Settings>(), Some(ResolverStrategy::Interpreted));
}

#[test]
fn test_enumerables_fall_back_to_compiled() {
    trait Step: Send + Sync {}
    struct Noop;
    impl Step for Noop {}

    let mut sc = ServiceCollection::new();
    sc.add_singleton_trait::<dyn Step>(Arc::new(Noop));
    sc.add_transient_trait_factory::<dyn Step, _>(|_| Arc::new(Noop));
    let sp = sc.build_with_options(inline(ResolverMode::Compiled)).unwrap();

    let steps = sp.get_all::<dyn Step>().unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(sp.strategy_of(Key::many::<dyn Step>()), Some(ResolverStrategy::Compiled));

    sp.get_required::<dyn Step>();
    assert_eq!(sp.strategy::<dyn Step>(), Some(ResolverStrategy::Specialized));
}

#[test]
fn test_large_graphs_fall_back_to_compiled() {
    let options = inline(ResolverMode::Compiled).with_specialization(true, 2);
    let sp = services().build_with_options(options).unwrap();

    sp.create_scope().get_required::<Service>();
    assert_eq!(sp.strategy::<Service>(), Some(ResolverStrategy::Compiled));
}

#[derive(Default)]
struct PromotionRecorder {
    promoted: Mutex<Vec<(Key, ResolverStrategy)>>,
    built: AtomicUsize,
}

impl ResolutionListener for PromotionRecorder {
    fn on_call_site_built(&self, _key: &Key, _call_site: &ferrous_resolve::CallSite) {
        self.built.fetch_add(1, Ordering::SeqCst);
    }

    fn on_promoted(&self, key: &Key, strategy: ResolverStrategy) {
        self.promoted.lock().push((*key, strategy));
    }
}

#[test]
fn test_listener_sees_builds_and_promotions() {
    let recorder = Arc::new(PromotionRecorder::default());
    let mut sc = services();
    sc.add_listener(recorder.clone());
    let sp: ServiceProvider = sc.build_with_options(inline(ResolverMode::Adaptive)).unwrap();

    let scope = sp.create_scope();
    scope.get_required::<Service>();
    // Service, Settings and Session graphs
    assert_eq!(recorder.built.load(Ordering::SeqCst), 3);
    assert!(recorder.promoted.lock().is_empty());

    scope.get_required::<Service>();
    scope.get_required::<Service>();

    let promoted = recorder.promoted.lock();
    assert_eq!(promoted.len(), 1);
    assert_eq!(promoted[0].0, Key::of::<Service>());
    assert_eq!(promoted[0].1, ResolverStrategy::Specialized);
    assert_eq!(recorder.built.load(Ordering::SeqCst), 3);
}

#[test]
fn test_promotion_inside_a_running_factory() {
    struct Report {
        stamps: Vec<usize>,
    }

    let mut sc = services();
    sc.add_transient_factory::<Report, _>(|scope| Report {
        stamps: (0..3).map(|_| scope.get_required::<Service>().stamp).collect(),
    });
    let sp = sc.build_with_options(inline(ResolverMode::Adaptive)).unwrap();
    let scope = sp.create_scope();

    let first = scope.get_required::<Report>();
    assert_eq!(sp.strategy::<Service>(), Some(ResolverStrategy::Specialized));
    assert_eq!(sp.strategy::<Report>(), Some(ResolverStrategy::Interpreted));

    let second = scope.get_required::<Report>();
    assert_eq!(sp.strategy::<Report>(), Some(ResolverStrategy::Specialized));

    let stamps: Vec<usize> = first.stamps.iter().chain(&second.stamps).copied().collect();
    assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
}
