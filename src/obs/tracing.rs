// self
use crate::{_prelude::*, obs::OpKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// A span builder used around refreshes and requests.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Creates a new span tagged with the provided operation kind + stage.
	pub fn new(kind: OpKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("jobber_graphql.op", op = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a background refresh failure that is not surfaced to any caller.
pub fn warn_swallowed_failure(kind: OpKind, err: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(op = kind.as_str(), error = %err, "background operation failed; next caller will retry");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, err);
	}
}

/// Logs when the next proactive refresh is due.
pub fn debug_refresh_scheduled(delay: Duration, generation: u64) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(delay_secs = delay.as_secs(), generation, "proactive refresh scheduled");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (delay, generation);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn helpers_noop_without_tracing() {
		let _span = OpSpan::new(OpKind::Query, "test");

		warn_swallowed_failure(OpKind::ProactiveRefresh, &Error::authentication("boom"));
		debug_refresh_scheduled(Duration::from_secs(5), 1);
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = OpSpan::new(OpKind::Refresh, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
