//! Validation runner
//!
//! Times, stamps and isolates every validator invocation. A validator that
//! errors or panics yields an empty result; the caller always gets an answer.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;

use dlg_core::time::elapsed_millis;
use dlg_core::traits::ConnectionResultStore;
use dlg_core::ConnectionResult;

use crate::context::ValidationContext;
use crate::validators::CapabilityValidator;

/// Runs capability validators against one delegate's context
#[derive(Clone)]
pub struct ValidationRunner {
    context: Arc<ValidationContext>,
    store: Option<Arc<dyn ConnectionResultStore>>,
}

impl ValidationRunner {
    pub fn new(context: ValidationContext) -> Self {
        Self {
            context: Arc::new(context),
            store: None,
        }
    }

    /// Upsert every produced result into `store`
    pub fn with_store(mut self, store: Arc<dyn ConnectionResultStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn context(&self) -> &ValidationContext {
        &self.context
    }

    /// Validate and stamp the results.
    ///
    /// Never fails: errors and panics inside the validator are logged and
    /// produce an empty list.
    pub async fn run(&self, validator: &CapabilityValidator) -> Vec<ConnectionResult> {
        let started = Instant::now();
        let outcome = AssertUnwindSafe(validator.validate(&self.context))
            .catch_unwind()
            .await;

        let fragments = match outcome {
            Ok(Ok(fragments)) => fragments,
            Ok(Err(e)) => {
                tracing::warn!(
                    kind = %validator.kind,
                    delegate_id = %validator.delegate_id,
                    "Validation failed: {}",
                    e
                );
                Vec::new()
            }
            Err(panic) => {
                tracing::error!(
                    kind = %validator.kind,
                    delegate_id = %validator.delegate_id,
                    "Validator panicked: {}",
                    panic_message(panic.as_ref())
                );
                Vec::new()
            }
        };

        let elapsed = elapsed_millis(started);
        let results: Vec<ConnectionResult> = fragments
            .into_iter()
            .map(|fragment| ConnectionResult {
                account_id: validator.account_id.clone(),
                delegate_id: validator.delegate_id.clone(),
                criteria: fragment.criteria,
                validated: fragment.validated,
                duration: fragment.duration.unwrap_or(elapsed),
            })
            .collect();

        tracing::debug!(
            kind = %validator.kind,
            results = results.len(),
            elapsed_ms = elapsed,
            "Validation finished"
        );

        if let Some(store) = &self.store {
            for result in &results {
                store.upsert(result.clone());
            }
        }
        results
    }

    /// Run and hand the results to `callback`, which is called exactly once
    pub async fn run_with_callback<F>(&self, validator: &CapabilityValidator, callback: F)
    where
        F: FnOnce(Vec<ConnectionResult>),
    {
        let results = self.run(validator).await;
        callback(results);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
