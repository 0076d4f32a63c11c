//! Producer composition
//!
//! Components are authored independently as producers and composed into a
//! tree. The same composite serves typed objects and pre-rendered chart text.

use std::marker::PhantomData;
use tracing::debug;

use crate::context::RenderContext;
use crate::error::{EngineError, Result};

/// Something that turns a render context into objects.
///
/// Returning an empty vector means "not applicable here" and is not an error.
pub trait Producer<T>: Send + Sync {
    fn name(&self) -> &str;

    fn produce(&self, ctx: &RenderContext) -> Result<Vec<T>>;
}

/// A producer backed by a plain function
pub struct FnProducer<T, F> {
    name: String,
    f: F,
    _marker: PhantomData<fn() -> T>,
}

/// Wrap a function as a named producer
pub fn producer<T, F>(name: &str, f: F) -> FnProducer<T, F>
where
    F: Fn(&RenderContext) -> Result<Vec<T>> + Send + Sync,
{
    FnProducer {
        name: name.to_string(),
        f,
        _marker: PhantomData,
    }
}

impl<T, F> Producer<T> for FnProducer<T, F>
where
    F: Fn(&RenderContext) -> Result<Vec<T>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn produce(&self, ctx: &RenderContext) -> Result<Vec<T>> {
        (self.f)(ctx)
    }
}

/// Runs its children in order and concatenates their output
pub struct Composite<T> {
    name: String,
    producers: Vec<Box<dyn Producer<T>>>,
}

impl<T> Composite<T> {
    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}

impl<T> Producer<T> for Composite<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn produce(&self, ctx: &RenderContext) -> Result<Vec<T>> {
        let mut out = Vec::new();
        for producer in &self.producers {
            let produced = producer.produce(ctx).map_err(|e| EngineError::Producer {
                name: producer.name().to_string(),
                source: Box::new(e),
            })?;
            if produced.is_empty() {
                debug!(composite = %self.name, producer = producer.name(), "producer not applicable");
                continue;
            }
            debug!(
                composite = %self.name,
                producer = producer.name(),
                count = produced.len(),
                "producer finished"
            );
            out.extend(produced);
        }
        Ok(out)
    }
}

/// Compose producers of typed objects, aborting on the first error
pub fn compose<T>(name: &str, producers: Vec<Box<dyn Producer<T>>>) -> Composite<T> {
    Composite {
        name: name.to_string(),
        producers,
    }
}

/// Compose producers of pre-rendered chart text
pub fn helm_compose(name: &str, producers: Vec<Box<dyn Producer<String>>>) -> Composite<String> {
    compose(name, producers)
}
