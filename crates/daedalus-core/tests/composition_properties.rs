//! Algebraic properties of capability composition and means derivation.

use daedalus_core::{
    with_modifier, BoxFuture, Capability, Context, Handler, HandlerResult, Means, Modification,
    Modifier, ModifierId,
};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, PartialEq)]
struct Trail(Vec<usize>);

struct StepModifier {
    id: ModifierId,
    index: usize,
}

impl Modifier for StepModifier {
    fn id(&self) -> ModifierId {
        self.id
    }

    fn modification<'a>(&'a self, ctx: &'a Context) -> BoxFuture<'a, HandlerResult<Modification>> {
        Box::pin(async move {
            let mut trail = ctx.get::<Trail>().cloned().unwrap_or_default();
            trail.0.push(self.index);
            Ok(Modification::new().with(trail))
        })
    }
}

#[derive(Clone)]
struct Step(Arc<StepModifier>);

impl Step {
    fn new(index: usize) -> Self {
        Self(Arc::new(StepModifier {
            id: ModifierId::mint(),
            index,
        }))
    }
}

impl Capability for Step {
    fn for_handler(&self, handler: Handler) -> Handler {
        with_modifier(self.0.clone(), handler)
    }
}

fn run(capability: &dyn Capability) -> Vec<usize> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let target = {
        let seen = seen.clone();
        Handler::new(move |ctx: Context| {
            let seen = seen.clone();
            async move {
                *seen.lock().unwrap() = ctx.get::<Trail>().cloned().unwrap_or_default().0;
                Ok(())
            }
        })
    };

    let handler = capability.for_handler(target);
    tokio_test::block_on(Context::root(Means::new()).next(&handler)).unwrap();
    let trail = seen.lock().unwrap().clone();
    trail
}

fn fold_left(steps: &[Step]) -> Box<dyn Capability> {
    let mut iter = steps.iter().cloned();
    let first: Box<dyn Capability> = Box::new(iter.next().unwrap());
    iter.fold(first, |acc, step| -> Box<dyn Capability> {
        Box::new(acc.and(step))
    })
}

fn fold_right(steps: &[Step]) -> Box<dyn Capability> {
    let mut iter = steps.iter().rev().cloned();
    let last: Box<dyn Capability> = Box::new(iter.next().unwrap());
    iter.fold(last, |acc, step| -> Box<dyn Capability> {
        Box::new(step.and(acc))
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_and_is_associative(count in 1usize..6) {
        let steps: Vec<Step> = (0..count).map(Step::new).collect();
        prop_assert_eq!(run(&*fold_left(&steps)), run(&*fold_right(&steps)));
        prop_assert_eq!(run(&*fold_left(&steps)), (0..count).collect::<Vec<_>>());
    }

    #[test]
    fn prop_repeated_capabilities_apply_once(picks in prop::collection::vec(0usize..4, 1..10)) {
        let pool: Vec<Step> = (0..4).map(Step::new).collect();
        let chosen: Vec<Step> = picks.iter().map(|&i| pool[i].clone()).collect();

        let mut expected = Vec::new();
        for &i in &picks {
            if !expected.contains(&i) {
                expected.push(i);
            }
        }

        prop_assert_eq!(run(&*fold_left(&chosen)), expected);
    }

    #[test]
    fn prop_means_are_additive(ops in prop::collection::vec((0u8..3, any::<u32>()), 0..12)) {
        #[derive(Debug, PartialEq)]
        struct A(u32);
        #[derive(Debug, PartialEq)]
        struct B(u32);
        #[derive(Debug, PartialEq)]
        struct C(u32);

        let slot = Arc::new(Mutex::new(None));
        let capture = {
            let slot = slot.clone();
            Handler::new(move |ctx: Context| {
                let slot = slot.clone();
                async move {
                    *slot.lock().unwrap() = Some(ctx);
                    Ok(())
                }
            })
        };

        let mut ctx = Context::root(Means::new());
        for (key, value) in ops {
            let modification = match key {
                0 => Modification::new().with(A(value)),
                1 => Modification::new().with(B(value)),
                _ => Modification::new().with(C(value)),
            };
            let before = ctx.means().len();
            tokio_test::block_on(ctx.next_with(&capture, modification)).unwrap();
            let child = slot.lock().unwrap().take().unwrap();

            prop_assert!(child.means().covers(ctx.means()));
            prop_assert!(child.means().len() >= before);
            match key {
                0 => prop_assert_eq!(child.get::<A>(), Some(&A(value))),
                1 => prop_assert_eq!(child.get::<B>(), Some(&B(value))),
                _ => prop_assert_eq!(child.get::<C>(), Some(&C(value))),
            }
            ctx = child;
        }
    }
}
