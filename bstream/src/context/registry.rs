//! Type registry behind [`super::StreamContext`].
//!
//! Types get tags in registration order. Declared base edges form a graph;
//! at build time the registry computes, for every `(from, to)` pair, whether
//! an object of `from` can be viewed as `to` and which edges lead there.
//!
//! Objects travel between hooks as type-erased boxes:
//! - a factory returns the concrete value (`C`, or `Arc<C>` for shared)
//! - `lift` wraps it as `Box<C>` / `Arc<C>` inside a `Box<dyn Any>`
//! - each edge turns `Box<From>` into `Box<To>` (or the `Arc` equivalent)

use std::any::{type_name, Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::error::StreamError;
use crate::ibstream::IBStream;
use crate::serialize::Deserialize;
use crate::types::{PolyTag, INVALID_TAG};

pub type SharedObject = Arc<dyn Any + Send + Sync>;

pub type RawFactory = fn(&mut IBStream<'_>) -> Result<Box<dyn Any>, StreamError>;
pub type SharedFactory = fn(&mut IBStream<'_>) -> Result<SharedObject, StreamError>;

type LiftRaw = fn(Box<dyn Any>) -> Result<Box<dyn Any>, StreamError>;
type LiftShared = fn(SharedObject) -> Result<Box<dyn Any + Send + Sync>, StreamError>;
type UpcastRaw = Box<dyn Fn(Box<dyn Any>) -> Result<Box<dyn Any>, StreamError> + Send + Sync>;
type UpcastShared = Box<
    dyn Fn(Box<dyn Any + Send + Sync>) -> Result<Box<dyn Any + Send + Sync>, StreamError>
        + Send
        + Sync,
>;

const ERASED_TYPE_MISMATCH: StreamError = StreamError::InvalidState("type-erased object of unexpected type");

pub(crate) struct TypeEntry {
    type_id: TypeId,
    name: &'static str,
    raw_factory: Option<RawFactory>,
    shared_factory: Option<SharedFactory>,
    lift_raw: Option<LiftRaw>,
    lift_shared: Option<LiftShared>,
}

impl TypeEntry {
    pub(crate) fn concrete<T: Deserialize + Send + Sync + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            raw_factory: Some(raw_factory::<T>),
            shared_factory: Some(shared_factory::<T>),
            lift_raw: Some(lift_raw::<T>),
            lift_shared: Some(lift_shared::<T>),
        }
    }

    pub(crate) fn abstract_type<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            raw_factory: None,
            shared_factory: None,
            lift_raw: None,
            lift_shared: None,
        }
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }
}

fn raw_factory<T: Deserialize + 'static>(is: &mut IBStream<'_>) -> Result<Box<dyn Any>, StreamError> {
    Ok(Box::new(T::deserialize(is)?))
}

fn shared_factory<T: Deserialize + Send + Sync + 'static>(
    is: &mut IBStream<'_>,
) -> Result<SharedObject, StreamError> {
    Ok(Arc::new(T::deserialize(is)?))
}

fn lift_raw<T: 'static>(object: Box<dyn Any>) -> Result<Box<dyn Any>, StreamError> {
    let object = object.downcast::<T>().map_err(|_| ERASED_TYPE_MISMATCH)?;
    Ok(Box::new(object))
}

fn lift_shared<T: Send + Sync + 'static>(object: SharedObject) -> Result<Box<dyn Any + Send + Sync>, StreamError> {
    let object = object.downcast::<T>().map_err(|_| ERASED_TYPE_MISMATCH)?;
    Ok(Box::new(object))
}

/// A declared "`from` is-a `to`" relation with its conversions.
pub(crate) struct BaseEdge {
    from: TypeId,
    from_name: &'static str,
    to: TypeId,
    to_name: &'static str,
    raw: UpcastRaw,
    shared: UpcastShared,
}

impl BaseEdge {
    pub(crate) fn new<C, B>(raw: fn(Box<C>) -> Box<B>, shared: fn(Arc<C>) -> Arc<B>) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        B: ?Sized + Send + Sync + 'static,
    {
        Self {
            from: TypeId::of::<C>(),
            from_name: type_name::<C>(),
            to: TypeId::of::<B>(),
            to_name: type_name::<B>(),
            raw: Box::new(move |object: Box<dyn Any>| {
                let object = object.downcast::<Box<C>>().map_err(|_| ERASED_TYPE_MISMATCH)?;
                Ok(Box::new(raw(*object)) as Box<dyn Any>)
            }),
            shared: Box::new(move |object: Box<dyn Any + Send + Sync>| {
                let object = object.downcast::<Arc<C>>().map_err(|_| ERASED_TYPE_MISMATCH)?;
                Ok(Box::new(shared(*object)) as Box<dyn Any + Send + Sync>)
            }),
        }
    }
}

struct ResolvedEdge {
    to: usize,
    raw: UpcastRaw,
    shared: UpcastShared,
}

pub(crate) struct TypeRegistry {
    entries: Vec<TypeEntry>,
    tags: HashMap<TypeId, PolyTag>,
    edges: Vec<ResolvedEdge>,
    /// `downcast[from * n + to]`
    downcast: Vec<bool>,
    /// Edge indices leading from `from` to `to`, same layout as `downcast`.
    routes: Vec<Vec<usize>>,
}

impl TypeRegistry {
    pub(crate) fn empty() -> Self {
        Self {
            entries: Vec::new(),
            tags: HashMap::new(),
            edges: Vec::new(),
            downcast: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// # Errors
    /// `InvalidOperation` for a type registered twice, `UnregisteredType`
    /// for an edge naming an unregistered type.
    pub(crate) fn build(entries: Vec<TypeEntry>, bases: Vec<BaseEdge>) -> Result<Self, StreamError> {
        let mut tags = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let tag = PolyTag::try_from(index).map_err(|_| StreamError::InvalidOperation("too many registered types"))?;
            if tags.insert(entry.type_id(), tag).is_some() {
                return Err(StreamError::InvalidOperation("type registered twice"));
            }
        }

        let mut edges = Vec::with_capacity(bases.len());
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); entries.len()];
        for base in bases {
            let from = lookup(&tags, base.from, base.from_name)?;
            let to = lookup(&tags, base.to, base.to_name)?;
            adjacency[from].push(edges.len());
            edges.push(ResolvedEdge {
                to,
                raw: base.raw,
                shared: base.shared,
            });
        }

        let n = entries.len();
        let mut downcast = vec![false; n * n];
        let mut routes = vec![Vec::new(); n * n];
        for from in 0..n {
            // Breadth-first, so each route is a shortest chain of edges.
            let mut via: Vec<Option<Vec<usize>>> = vec![None; n];
            via[from] = Some(Vec::new());
            let mut queue = VecDeque::from([from]);
            while let Some(node) = queue.pop_front() {
                let route = via[node].clone().unwrap_or_default();
                for &edge in &adjacency[node] {
                    let to = edges[edge].to;
                    if via[to].is_none() {
                        let mut extended = route.clone();
                        extended.push(edge);
                        via[to] = Some(extended);
                        queue.push_back(to);
                    }
                }
            }
            for (to, route) in via.into_iter().enumerate() {
                if let Some(route) = route {
                    downcast[from * n + to] = true;
                    routes[from * n + to] = route;
                }
            }
        }

        Ok(Self {
            entries,
            tags,
            edges,
            downcast,
            routes,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn tag_of(&self, type_id: TypeId) -> PolyTag {
        self.tags.get(&type_id).copied().unwrap_or(INVALID_TAG)
    }

    pub(crate) fn entry(&self, tag: PolyTag) -> Result<&TypeEntry, StreamError> {
        usize::try_from(tag)
            .ok()
            .and_then(|index| self.entries.get(index))
            .ok_or(StreamError::InvalidTag(tag))
    }

    pub(crate) fn can_downcast(&self, from: PolyTag, to: PolyTag) -> bool {
        match (self.index(from), self.index(to)) {
            (Some(from), Some(to)) => self.downcast[from * self.len() + to],
            _ => false,
        }
    }

    pub(crate) fn create_raw(&self, tag: PolyTag, is: &mut IBStream<'_>) -> Result<Option<Box<dyn Any>>, StreamError> {
        match self.entry(tag)?.raw_factory {
            Some(factory) => factory(is).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn create_shared(&self, tag: PolyTag, is: &mut IBStream<'_>) -> Result<Option<SharedObject>, StreamError> {
        match self.entry(tag)?.shared_factory {
            Some(factory) => factory(is).map(Some),
            None => Ok(None),
        }
    }

    /// Turn a concrete object of type `from` into a `Box<dyn Any>` holding
    /// `Box<To>` for the type tagged `to`.
    pub(crate) fn upcast_raw(&self, from: PolyTag, to: PolyTag, object: Box<dyn Any>) -> Result<Box<dyn Any>, StreamError> {
        let lift = self.entry(from)?.lift_raw.ok_or(StreamError::AbstractNonPolyClass(from))?;
        let mut object = lift(object)?;
        for &edge in self.route(from, to)? {
            object = (self.edges[edge].raw)(object)?;
        }
        Ok(object)
    }

    /// As [`TypeRegistry::upcast_raw`], producing `Arc<To>`.
    pub(crate) fn upcast_shared(
        &self,
        from: PolyTag,
        to: PolyTag,
        object: SharedObject,
    ) -> Result<Box<dyn Any + Send + Sync>, StreamError> {
        let lift = self.entry(from)?.lift_shared.ok_or(StreamError::AbstractNonPolyClass(from))?;
        let mut object = lift(object)?;
        for &edge in self.route(from, to)? {
            object = (self.edges[edge].shared)(object)?;
        }
        Ok(object)
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(TypeEntry::name)
    }

    fn route(&self, from: PolyTag, to: PolyTag) -> Result<&[usize], StreamError> {
        if !self.can_downcast(from, to) {
            return Err(StreamError::InvalidPtrDowncast { from, to });
        }
        match (self.index(from), self.index(to)) {
            (Some(from), Some(to)) => Ok(&self.routes[from * self.len() + to]),
            _ => Err(StreamError::InvalidPtrDowncast { from, to }),
        }
    }

    fn index(&self, tag: PolyTag) -> Option<usize> {
        usize::try_from(tag).ok().filter(|index| *index < self.len())
    }
}

fn lookup(tags: &HashMap<TypeId, PolyTag>, type_id: TypeId, name: &'static str) -> Result<usize, StreamError> {
    tags.get(&type_id)
        .and_then(|tag| usize::try_from(*tag).ok())
        .ok_or(StreamError::UnregisteredType(name))
}
