//! Flattened resolver: the call-site graph as a linear instruction program.
//!
//! Instructions are emitted in postorder so execution is a loop over a value
//! stack with no per-node closure dispatch. Cached nodes compile to a probe
//! that jumps past the whole subtree on a hit; on a miss the subtree runs as
//! the initializer of the store entry.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::call_site::{CallSite, Node};
use crate::descriptors::{erase, AnyArc, Constructed, ConstructorInvoker, FactoryFn};
use crate::error::{DiError, DiResult};
use crate::internal::FactoryGuard;
use crate::key::{CacheKey, Key};
use crate::provider::{Scope, ScopeFactory};

enum Op {
    Constant(AnyArc),
    /// Pop `argc` values, invoke, push the result
    Construct {
        invoke: ConstructorInvoker,
        argc: usize,
        track: bool,
    },
    Factory {
        key: Key,
        factory: FactoryFn,
        track: bool,
    },
    ServiceProvider,
    ScopeFactory,
    /// Push the entry's value, building it from the ops up to `skip_to - 1`
    /// when absent, then jump to `skip_to`
    CacheProbe {
        cache_key: CacheKey,
        root: bool,
        skip_to: usize,
    },
    /// End of a cached subtree
    CacheEnd,
}

#[derive(Default)]
struct Frame {
    values: SmallVec<[AnyArc; 8]>,
    pending: Option<Constructed>,
}

pub(crate) struct SpecializedResolver {
    key: Key,
    ops: Vec<Op>,
}

impl SpecializedResolver {
    /// Program for `site`, or `None` when the graph holds an enumerable or
    /// exceeds `threshold` instructions.
    pub(crate) fn build(site: &CallSite, threshold: usize) -> Option<Self> {
        let mut ops = Vec::new();
        emit(site, &mut ops, true, threshold)?;
        Some(Self { key: site.key(), ops })
    }

    pub(crate) fn len(&self) -> usize {
        self.ops.len()
    }

    pub(crate) fn resolve(&self, scope: &Scope) -> DiResult<AnyArc> {
        let mut frame = Frame::default();
        self.run(0, self.ops.len(), scope, &mut frame)?;
        frame.values.pop().ok_or(DiError::TypeMismatch(self.key.display_name()))
    }

    fn run(&self, start: usize, end: usize, scope: &Scope, frame: &mut Frame) -> DiResult<()> {
        let mut pc = start;
        while pc < end {
            match &self.ops[pc] {
                Op::Constant(value) => frame.values.push(value.clone()),
                Op::Construct { invoke, argc, track } => {
                    let start = frame.values.len().saturating_sub(*argc);
                    let args: Vec<AnyArc> = frame.values.drain(start..).collect();
                    let constructed = invoke(args)?;
                    frame.finish(constructed, *track, scope)?;
                }
                Op::Factory { key, factory, track } => {
                    let constructed = {
                        let _guard = FactoryGuard::enter(*key)?;
                        factory(scope)?
                    };
                    frame.finish(constructed, *track, scope)?;
                }
                Op::ServiceProvider => frame.values.push(erase(Arc::new(scope.clone()))),
                Op::ScopeFactory => frame.values.push(erase(Arc::new(ScopeFactory::new(scope.root().clone())))),
                Op::CacheProbe { cache_key, root, skip_to } => {
                    let target = if *root { scope.root() } else { scope };
                    let value = target.store().get_or_construct(*cache_key, || {
                        let mut inner = Frame::default();
                        self.run(pc + 1, skip_to - 1, target, &mut inner)?;
                        inner.pending.take().ok_or(DiError::TypeMismatch(self.key.display_name()))
                    })?;
                    frame.values.push(value);
                    pc = *skip_to;
                    continue;
                }
                Op::CacheEnd => {}
            }
            pc += 1;
        }
        Ok(())
    }
}

impl Frame {
    fn finish(&mut self, constructed: Constructed, track: bool, scope: &Scope) -> DiResult<()> {
        if track {
            self.values.push(scope.store().track(constructed)?);
        } else {
            self.pending = Some(constructed);
        }
        Ok(())
    }
}

fn emit(site: &CallSite, ops: &mut Vec<Op>, track: bool, threshold: usize) -> Option<()> {
    match &site.node {
        Node::Constant { value } => ops.push(Op::Constant(value.clone())),
        Node::Constructor { invoke, params, .. } => {
            for param in params {
                emit(param, ops, true, threshold)?;
            }
            ops.push(Op::Construct {
                invoke: invoke.clone(),
                argc: params.len(),
                track,
            });
        }
        Node::Factory { factory } => ops.push(Op::Factory {
            key: site.key(),
            factory: factory.clone(),
            track,
        }),
        Node::Singleton { cache_key, inner } | Node::Scoped { cache_key, inner } => {
            let probe = ops.len();
            ops.push(Op::CacheProbe {
                cache_key: *cache_key,
                root: matches!(site.node, Node::Singleton { .. }),
                skip_to: 0,
            });
            emit(inner, ops, false, threshold)?;
            ops.push(Op::CacheEnd);

            let end = ops.len();
            if let Op::CacheProbe { skip_to, .. } = &mut ops[probe] {
                *skip_to = end;
            }
        }
        Node::ServiceProvider => ops.push(Op::ServiceProvider),
        Node::ScopeFactory => ops.push(Op::ScopeFactory),
        Node::Enumerable { .. } => return None,
    }

    if ops.len() > threshold {
        None
    } else {
        Some(())
    }
}
