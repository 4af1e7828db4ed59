use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use stratum_di::{
    AdHocConstructible, Args, AsyncConstructible, Constructible, DefinitionSet, DiError, DiResult,
    Tier, Token,
};

struct Base(u32);
struct Next(u32);

#[tokio::test]
async fn value_then_factory_resolves_in_order() {
    let mut defs = DefinitionSet::new();
    defs.add_value(Base(1));
    defs.add_factory::<Next, _>(Tier::Global, vec![Token::of::<Base>()], |args| {
        Ok(Next(args.get::<Base>(0)?.0 + 1))
    });

    let registry = defs.build().await.unwrap();
    assert_eq!(registry.get::<Next>().unwrap().0, 2);
}

#[tokio::test]
async fn globals_are_singletons() {
    let mut defs = DefinitionSet::new();
    defs.add_factory::<Base, _>(Tier::Global, Vec::new(), |_| Ok(Base(7)));

    let registry = defs.build().await.unwrap();
    let a = registry.get::<Base>().unwrap();
    let b = registry.get::<Base>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn definition_set_exposes_its_registrations() {
    let mut defs = DefinitionSet::new();
    defs.add_value(Base(1));
    defs.add_factory::<Next, _>(Tier::Session, vec![Token::of::<Base>()], |args| {
        Ok(Next(args.get::<Base>(0)?.0))
    });

    assert_eq!(defs.len(), 2);
    let next = defs
        .definitions()
        .iter()
        .find(|d| d.token() == &Token::of::<Next>())
        .expect("Next is registered");
    assert_eq!(next.tier(), Tier::Session);
    assert_eq!(next.dependencies(), &[Token::of::<Base>()]);
}

#[tokio::test]
async fn reregistering_a_token_overwrites() {
    let mut defs = DefinitionSet::new();
    defs.add_value(Base(1));
    defs.add_value(Base(2));

    let registry = defs.build().await.unwrap();
    assert_eq!(registry.get::<Base>().unwrap().0, 2);
}

#[tokio::test]
async fn named_tokens_resolve_independently() {
    let mut defs = DefinitionSet::new();
    defs.add_named_value("primary-port", 5432u16);
    defs.add_named_value("replica-port", 5433u16);

    let registry = defs.build().await.unwrap();
    assert_eq!(*registry.get_named::<u16>("primary-port").unwrap(), 5432);
    assert_eq!(*registry.get_named::<u16>("replica-port").unwrap(), 5433);
}

#[tokio::test]
async fn injected_value_round_trips_without_resolution() {
    struct Handle(&'static str);

    let registry = DefinitionSet::new().build().await.unwrap();
    registry.inject(Handle("external"));

    let a = registry.get::<Handle>().unwrap();
    let b = registry.get::<Handle>().unwrap();
    assert_eq!(a.0, "external");
    assert!(Arc::ptr_eq(&a, &b));
}

#[tokio::test]
async fn injected_definition_participates_in_dependencies() {
    struct Env(&'static str);
    struct Banner(String);

    let mut defs = DefinitionSet::new();
    defs.inject(Env("prod"));
    defs.add_factory::<Banner, _>(Tier::Global, vec![Token::of::<Env>()], |args| {
        Ok(Banner(format!("env={}", args.get::<Env>(0)?.0)))
    });

    let registry = defs.build().await.unwrap();
    assert_eq!(registry.get::<Banner>().unwrap().0, "env=prod");
}

#[tokio::test]
async fn class_construction_runs_init_hook() {
    struct Config {
        url: &'static str,
    }

    struct Repo {
        url: String,
        ready: AtomicBool,
    }

    #[async_trait]
    impl Constructible for Repo {
        fn construct(args: &Args) -> DiResult<Self> {
            Ok(Repo {
                url: args.get::<Config>(0)?.url.to_owned(),
                ready: AtomicBool::new(false),
            })
        }

        async fn initialize(&self) -> DiResult<()> {
            self.ready.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    let mut defs = DefinitionSet::new();
    defs.add_value(Config { url: "postgres://localhost" });
    defs.add_class::<Repo>(Tier::Global, vec![Token::of::<Config>()]);

    let registry = defs.build().await.unwrap();
    let repo = registry.get::<Repo>().unwrap();
    assert_eq!(repo.url, "postgres://localhost");
    assert!(repo.ready.load(Ordering::SeqCst));
}

#[tokio::test]
async fn async_class_uses_fully_formed_construction() {
    struct Pool {
        size: u32,
    }

    #[async_trait]
    impl AsyncConstructible for Pool {
        async fn create(_args: Args) -> DiResult<Self> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(Pool { size: 4 })
        }
    }

    let mut defs = DefinitionSet::new();
    defs.add_async_class::<Pool>(Tier::Global, Vec::new());

    let registry = defs.build().await.unwrap();
    assert_eq!(registry.get::<Pool>().unwrap().size, 4);
}

#[tokio::test]
async fn async_factory_is_awaited() {
    struct Token2(u64);

    let mut defs = DefinitionSet::new();
    defs.add_async_factory::<Token2, _, _>(Tier::Global, Vec::new(), |_args| async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(Token2(99))
    });

    let registry = defs.build().await.unwrap();
    assert_eq!(registry.get::<Token2>().unwrap().0, 99);
}

#[tokio::test]
async fn ad_hoc_fallback_requires_a_grant() {
    struct Metrics;

    impl AdHocConstructible for Metrics {
        fn construct_ad_hoc() -> Self {
            Metrics
        }
    }

    struct Service {
        has_metrics: bool,
    }

    let mut defs = DefinitionSet::new();
    defs.permit_ad_hoc::<Metrics>();
    defs.add_factory::<Service, _>(Tier::Global, vec![Token::of::<Metrics>()], |args| {
        Ok(Service { has_metrics: args.get::<Metrics>(0).is_ok() })
    });

    let registry = defs.build().await.unwrap();
    assert!(registry.get::<Service>().unwrap().has_metrics);
}

#[tokio::test]
async fn factory_failure_is_wrapped_and_fatal_at_bootstrap() {
    struct Broken;

    let mut defs = DefinitionSet::new();
    defs.add_factory::<Broken, _>(Tier::Global, Vec::new(), |_| -> DiResult<Broken> {
        Err(DiError::Provider("boom".to_owned()))
    });

    let err = defs.build().await.err().expect("bootstrap must fail");
    match err {
        DiError::ConstructionFailed { token, source } => {
            assert!(token.contains("Broken"));
            assert!(matches!(*source, DiError::Provider(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_token_is_not_registered() {
    struct Nowhere;

    let registry = DefinitionSet::new().build().await.unwrap();
    assert!(matches!(
        registry.get::<Nowhere>(),
        Err(DiError::NotRegistered(_))
    ));
}

#[tokio::test]
async fn typed_accessor_rejects_wrong_type() {
    let mut defs = DefinitionSet::new();
    defs.add_named_value("port", 8080u16);

    let registry = defs.build().await.unwrap();
    assert!(matches!(
        registry.get_named::<String>("port"),
        Err(DiError::TypeMismatch(_))
    ));
}

#[tokio::test]
async fn dynamic_definitions_extend_the_global_tier() {
    struct Core(u32);
    struct Plugin(u32);

    let mut defs = DefinitionSet::new();
    defs.add_value(Core(10));
    let registry = defs.build().await.unwrap();

    let mut extra = DefinitionSet::new();
    extra.add_factory::<Plugin, _>(Tier::Global, vec![Token::of::<Core>()], |args| {
        Ok(Plugin(args.get::<Core>(0)?.0 + 5))
    });
    registry.add_dynamic_definitions(extra).await.unwrap();

    assert_eq!(registry.get::<Plugin>().unwrap().0, 15);
}

#[tokio::test]
async fn failed_dynamic_definitions_leave_registry_intact() {
    struct Core(u32);
    struct Plugin(u32);
    struct Absent;

    let mut defs = DefinitionSet::new();
    defs.add_value(Core(10));
    let registry = defs.build().await.unwrap();

    let mut extra = DefinitionSet::new();
    extra.add_factory::<Plugin, _>(Tier::Global, vec![Token::of::<Absent>()], |_| Ok(Plugin(0)));
    let err = registry.add_dynamic_definitions(extra).await.err().unwrap();
    assert!(matches!(err, DiError::UnregisteredDependency { .. }));

    // The original graph still serves, the failed addition never landed.
    assert_eq!(registry.get::<Core>().unwrap().0, 10);
    assert!(matches!(
        registry.get::<Plugin>(),
        Err(DiError::NotRegistered(_))
    ));
}
