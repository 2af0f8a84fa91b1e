//! A unit of work: an operation name, its arguments, and the code to run.

use crate::fingerprint::fingerprint;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use taskmill_core::{Error, Result};

type Operation<'a, T> = Box<dyn FnOnce() -> LocalBoxFuture<'a, Result<T>> + 'a>;

/// One independent piece of work submitted to a [`crate::TaskScheduler`]
///
/// The arguments are serialized once at construction. They are handed to the
/// operation when it runs and, together with the operation name, make up the
/// unit's fingerprint. Put named arguments in a struct or map; field order
/// does not affect the fingerprint.
pub struct WorkUnit<'a, T> {
    operation: String,
    args: Value,
    fingerprint: String,
    cacheable: bool,
    run: Operation<'a, T>,
}

impl<'a, T: 'a> WorkUnit<'a, T> {
    pub fn new<A, F, Fut>(operation: impl Into<String>, args: A, op: F) -> Result<Self>
    where
        A: Serialize + 'a,
        F: FnOnce(A) -> Fut + 'a,
        Fut: Future<Output = Result<T>> + 'a,
    {
        let operation = operation.into();
        let args_value = serde_json::to_value(&args).map_err(|e| Error::Json {
            message: format!("arguments of '{operation}' are not serializable"),
            source: e,
        })?;
        let fingerprint = fingerprint(&operation, &args_value);

        Ok(Self {
            operation,
            args: args_value,
            fingerprint,
            cacheable: true,
            run: Box::new(move || op(args).boxed_local()),
        })
    }

    /// Never read from or write to the result cache for this unit
    pub fn uncached(mut self) -> Self {
        self.cacheable = false;
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn args(&self) -> &Value {
        &self.args
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    pub(crate) fn into_future(self) -> LocalBoxFuture<'a, Result<T>> {
        (self.run)()
    }
}

impl<T> fmt::Debug for WorkUnit<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkUnit")
            .field("operation", &self.operation)
            .field("args", &self.args)
            .field("fingerprint", &self.fingerprint)
            .field("cacheable", &self.cacheable)
            .finish_non_exhaustive()
    }
}
