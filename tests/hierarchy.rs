use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use stratum_di::{DefinitionSet, DiError, Tier, Token};

struct Shared(u32);

#[tokio::test]
async fn child_resolves_parent_global_without_rebuilding() {
    let builds = Arc::new(AtomicU32::new(0));
    let mut parent_defs = DefinitionSet::new();
    let count = builds.clone();
    parent_defs.add_factory::<Shared, _>(Tier::Global, Vec::new(), move |_| {
        Ok(Shared(count.fetch_add(1, Ordering::SeqCst)))
    });
    let parent = parent_defs.build().await.unwrap();

    let child = DefinitionSet::new().build_child(&parent).await.unwrap();

    let from_parent = parent.get::<Shared>().unwrap();
    let from_child = child.get::<Shared>().unwrap();
    assert!(Arc::ptr_eq(&from_parent, &from_child));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn child_view_falls_back_to_parent_globals() {
    let mut parent_defs = DefinitionSet::new();
    parent_defs.add_value(Shared(9));
    let parent = parent_defs.build().await.unwrap();

    let child = DefinitionSet::new().build_child(&parent).await.unwrap();
    let view = child.build_view("s1", None).await.unwrap();
    assert_eq!(view.get::<Shared>().unwrap().0, 9);
}

#[tokio::test]
async fn child_global_may_depend_on_parent_global() {
    struct Derived(u32);

    let mut parent_defs = DefinitionSet::new();
    parent_defs.add_value(Shared(10));
    let parent = parent_defs.build().await.unwrap();

    let mut child_defs = DefinitionSet::new();
    child_defs.add_factory::<Derived, _>(Tier::Global, vec![Token::of::<Shared>()], |args| {
        Ok(Derived(args.get::<Shared>(0)?.0 * 3))
    });
    let child = child_defs.build_child(&parent).await.unwrap();

    assert_eq!(child.get::<Derived>().unwrap().0, 30);
}

#[tokio::test]
async fn child_global_on_parent_session_is_a_scope_violation() {
    struct PerSession;
    struct Greedy;

    let mut parent_defs = DefinitionSet::new();
    parent_defs.add_factory::<PerSession, _>(Tier::Session, Vec::new(), |_| Ok(PerSession));
    let parent = parent_defs.build().await.unwrap();

    let mut child_defs = DefinitionSet::new();
    child_defs.add_factory::<Greedy, _>(Tier::Global, vec![Token::of::<PerSession>()], |_| {
        Ok(Greedy)
    });

    assert!(matches!(
        child_defs.build_child(&parent).await,
        Err(DiError::ScopeViolation { dependency_tier: Tier::Session, .. })
    ));
}

#[tokio::test]
async fn ancestor_session_recipe_builds_into_child_store() {
    struct ParentScoped(u32);
    struct ChildScoped(u32);

    let mut parent_defs = DefinitionSet::new();
    parent_defs.add_factory::<ParentScoped, _>(Tier::Session, Vec::new(), |_| Ok(ParentScoped(5)));
    let parent = parent_defs.build().await.unwrap();

    let mut child_defs = DefinitionSet::new();
    child_defs.add_factory::<ChildScoped, _>(
        Tier::Session,
        vec![Token::of::<ParentScoped>()],
        |args| Ok(ChildScoped(args.get::<ParentScoped>(0)?.0 + 1)),
    );
    let child = child_defs.build_child(&parent).await.unwrap();

    let view = child.build_view("s1", None).await.unwrap();
    assert_eq!(view.get::<ChildScoped>().unwrap().0, 6);
    // Built into the child's own session cache, not the parent's.
    assert_eq!(child.session_count(), 1);
    assert_eq!(parent.session_count(), 0);
}

#[tokio::test]
async fn local_definition_shadows_the_parent() {
    let mut parent_defs = DefinitionSet::new();
    parent_defs.add_value(Shared(1));
    let parent = parent_defs.build().await.unwrap();

    let mut child_defs = DefinitionSet::new();
    child_defs.add_value(Shared(2));
    let child = child_defs.build_child(&parent).await.unwrap();

    assert_eq!(parent.get::<Shared>().unwrap().0, 1);
    assert_eq!(child.get::<Shared>().unwrap().0, 2);
}

#[tokio::test]
async fn absent_everywhere_is_not_registered() {
    struct Nowhere;

    let parent = DefinitionSet::new().build().await.unwrap();
    let child = DefinitionSet::new().build_child(&parent).await.unwrap();

    assert!(matches!(
        child.get::<Nowhere>(),
        Err(DiError::NotRegistered(_))
    ));
}
