//! Runs one binding for one envelope and drives its acknowledgement.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::workers::{Task, WorkerPools};

use super::DISPATCH_TARGET;
use super::binding::HandlerBinding;
use super::errors::{DispatchError, HandlerError};
use super::gate;
use super::outcome::{HandlerOutcome, TaskOutcome};
use super::policy::FailurePolicy;
use super::request::Request;

/// Where an invocation ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    /// Authorization denied the call; the handler never ran.
    Rejected,
    /// The handler finished inline.
    CompletedInline,
    /// The handler deferred work; any ack follows the task's completion.
    Deferred,
    /// The handler or submission failed and the failure was recorded.
    Failed,
}

/// Applies authorization, failure isolation and acknowledgement around
/// handler calls.
#[derive(Debug)]
pub struct Invoker {
    policy: FailurePolicy,
    pools: Arc<WorkerPools>,
}

impl Invoker {
    /// Builds an invoker submitting deferred work to `pools`.
    pub fn new(policy: FailurePolicy, pools: Arc<WorkerPools>) -> Self {
        Self { policy, pools }
    }

    /// The failure policy in force.
    pub fn policy(&self) -> &FailurePolicy {
        &self.policy
    }

    /// Pools receiving deferred tasks.
    pub fn pools(&self) -> &Arc<WorkerPools> {
        &self.pools
    }

    /// Invokes `binding` for `request`.
    ///
    /// # Errors
    ///
    /// Returns the failure when exceptions are not forwarded. With
    /// forwarding enabled the failure is acknowledged (if an ack was
    /// requested) or only logged, and `Ok` is returned.
    pub fn invoke(
        &self,
        binding: &HandlerBinding,
        request: &Request<'_>,
    ) -> Result<InvocationState, DispatchError> {
        let type_tag = binding.type_tag();
        if let Err(denial) = gate::authorize(binding.policy(), request.identity()) {
            let error = DispatchError::Unauthorized {
                type_tag: type_tag.to_owned(),
                denial,
            };
            return self.isolate(error, request, InvocationState::Rejected);
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| binding.handler().handle(request)))
            .unwrap_or_else(|payload| Err(HandlerError::panicked(payload)));
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(source) => {
                let error = DispatchError::HandlerFailure {
                    type_tag: type_tag.to_owned(),
                    source,
                };
                return self.isolate(error, request, InvocationState::Failed);
            }
        };

        match outcome {
            HandlerOutcome::Deferred(task) => self.defer(task, request),
            HandlerOutcome::NoResult => Ok(complete_inline(TaskOutcome::NoResult, request)),
            HandlerOutcome::Success(value) => {
                Ok(complete_inline(TaskOutcome::Success(value), request))
            }
            HandlerOutcome::Error(error) => Ok(complete_inline(TaskOutcome::Error(error), request)),
        }
    }

    fn defer(
        &self,
        task: Task,
        request: &Request<'_>,
    ) -> Result<InvocationState, DispatchError> {
        let task = if request.envelope().wants_ack() {
            let context = request.context().clone();
            task.acknowledge_with(move |outcome| context.acknowledge(outcome))
        } else {
            task
        };
        let kind = task.kind();
        match self.pools.submit(task) {
            Ok(()) => {
                debug!(
                    target: DISPATCH_TARGET,
                    type_tag = request.envelope().type_tag(),
                    %kind,
                    "deferred task submitted"
                );
                Ok(InvocationState::Deferred)
            }
            Err(error) => self.isolate(DispatchError::from(error), request, InvocationState::Failed),
        }
    }

    fn isolate(
        &self,
        error: DispatchError,
        request: &Request<'_>,
        state: InvocationState,
    ) -> Result<InvocationState, DispatchError> {
        let envelope = request.envelope();
        warn!(
            target: DISPATCH_TARGET,
            type_tag = envelope.type_tag(),
            correlation_id = envelope.correlation_id(),
            forwarded = self.policy.forward_exceptions(),
            %error,
            "invocation failed"
        );
        if !self.policy.forward_exceptions() {
            return Err(error);
        }
        if envelope.wants_ack() {
            let typed = self.policy.typed_error(&error);
            request.context().acknowledge(&TaskOutcome::Error(typed));
        }
        Ok(state)
    }
}

fn complete_inline(outcome: TaskOutcome, request: &Request<'_>) -> InvocationState {
    if request.envelope().wants_ack() {
        request.context().acknowledge(&outcome);
    }
    InvocationState::CompletedInline
}

#[cfg(test)]
mod tests {
    use std::error::Error as StdError;

    use rstest::{fixture, rstest};

    use super::*;
    use crate::groups::LocalPubSub;
    use crate::identity::AnonymousAuthenticator;
    use crate::session::{ConnectionId, Session};
    use crate::transport::CollectingSink;
    use crate::wire::{Envelope, message_types};

    struct Harness {
        sink: Arc<CollectingSink>,
        session: Arc<Session>,
    }

    #[fixture]
    fn harness() -> Harness {
        let sink = Arc::new(CollectingSink::new());
        let session = Arc::new(Session::new(
            ConnectionId::new(3),
            sink.clone(),
            Arc::new(AnonymousAuthenticator),
            Arc::new(LocalPubSub::new()),
        ));
        Harness { sink, session }
    }

    fn invoker(policy: FailurePolicy) -> Invoker {
        Invoker::new(policy, Arc::new(WorkerPools::disabled()))
    }

    fn acked_envelope(type_tag: &str) -> Envelope {
        let frame = format!(r#"{{"headers":{{"messageType":"{type_tag}","ack":true,"uuid":"i1"}}}}"#);
        Envelope::decode(frame.as_bytes()).expect("decode envelope")
    }

    fn failing() -> HandlerBinding {
        HandlerBinding::from_fn("fails", |_| Err(HandlerError::new("bad input"))).requires_auth(false)
    }

    fn panicking() -> HandlerBinding {
        HandlerBinding::from_fn("explodes", |_| panic!("handler exploded")).requires_auth(false)
    }

    #[rstest]
    #[case::error(failing(), "bad input")]
    #[case::panic(panicking(), "handler panicked: handler exploded")]
    fn inline_failures_are_forwarded_as_typed_errors(
        harness: Harness,
        #[case] binding: HandlerBinding,
        #[case] expected: &str,
    ) {
        let envelope = acked_envelope(binding.type_tag());
        let request = Request::new(&envelope, &harness.session);

        let state = invoker(FailurePolicy::new(true))
            .invoke(&binding, &request)
            .expect("failure is forwarded");

        assert_eq!(state, InvocationState::Failed);
        let messages = harness.sink.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_type(), message_types::ACK);
        assert_eq!(messages[0].correlation_id(), Some("i1"));
        assert_eq!(messages[0].body().get("error_message"), Some(&expected.into()));
        assert_eq!(messages[0].body().get("error_code"), None);
    }

    #[rstest]
    fn inline_failures_are_returned_without_forwarding(harness: Harness) {
        let binding = panicking();
        let envelope = acked_envelope(binding.type_tag());
        let request = Request::new(&envelope, &harness.session);

        let error = invoker(FailurePolicy::new(false))
            .invoke(&binding, &request)
            .expect_err("failure is returned");

        assert!(matches!(error, DispatchError::HandlerFailure { .. }));
        assert!(harness.sink.messages().is_empty());
    }

    #[rstest]
    fn custom_formatter_renders_forwarded_errors(harness: Harness) {
        let policy = FailurePolicy::new(true).with_formatter(Arc::new(
            |error: &dyn StdError| format!("request rejected ({error})"),
        ));
        let invoker = invoker(policy);

        let binding = failing();
        let envelope = acked_envelope(binding.type_tag());
        invoker
            .invoke(&binding, &Request::new(&envelope, &harness.session))
            .expect("failure is forwarded");

        let restricted = HandlerBinding::from_fn("restricted", |_| Ok(HandlerOutcome::NoResult));
        let envelope = acked_envelope(restricted.type_tag());
        let state = invoker
            .invoke(&restricted, &Request::new(&envelope, &harness.session))
            .expect("denial is forwarded");
        assert_eq!(state, InvocationState::Rejected);

        let messages = harness.sink.messages();
        assert_eq!(
            messages[0].body().get("error_message"),
            Some(&"request rejected (bad input)".into())
        );
        let denied = messages[1].body();
        assert_eq!(denied.get("error_code"), Some(&"unauthorized".into()));
        assert!(
            denied
                .get("error_message")
                .and_then(|value| value.as_str())
                .is_some_and(|text| text.starts_with("request rejected (")),
            "{denied:?}"
        );
    }
}
