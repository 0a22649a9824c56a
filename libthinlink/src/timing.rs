//! Reports how long each planning phase took when `--time` is passed. Output goes to stderr so
//! that it doesn't get mixed up with the plan.

use crate::error::Context as _;
use crate::error::Result;
use std::fmt::Write as _;
use std::time::Instant;
use tracing::field::Visit;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

#[derive(Default)]
struct TimingLayer;

struct SpanTiming {
    start: Instant,
    fields: String,
}

/// Formats span fields as ` [a=1, b=2]`.
#[derive(Default)]
struct FieldsFormatter {
    out: String,
}

impl FieldsFormatter {
    fn finish(mut self) -> String {
        if !self.out.is_empty() {
            self.out.push(']');
        }
        self.out
    }
}

impl Visit for FieldsFormatter {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.out.push_str(if self.out.is_empty() { " [" } else { ", " });
        let _ = write!(&mut self.out, "{}={value:?}", field.name());
    }
}

impl<S> tracing_subscriber::Layer<S> for TimingLayer
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span>,
{
    fn max_level_hint(&self) -> Option<tracing::level_filters::LevelFilter> {
        Some(tracing::level_filters::LevelFilter::INFO)
    }

    fn on_new_span(
        &self,
        attributes: &tracing::span::Attributes,
        id: &tracing::span::Id,
        ctx: Context<S>,
    ) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = FieldsFormatter::default();
        attributes.values().record(&mut fields);
        span.extensions_mut().insert(SpanTiming {
            start: Instant::now(),
            fields: fields.finish(),
        });
    }

    fn on_close(&self, id: tracing::span::Id, ctx: Context<S>) {
        let Some(span) = ctx.span(&id) else {
            return;
        };
        if let Some(timing) = span.extensions().get::<SpanTiming>() {
            let depth = span.scope().count() - 1;
            let ms = timing.start.elapsed().as_secs_f64() * 1000.0;
            eprintln!(
                "{:indent$}{ms:>8.3} ms {}{}",
                "",
                span.metadata().name(),
                timing.fields,
                indent = depth * 2
            );
        }
    }
}

pub(crate) fn init_tracing() -> Result {
    use tracing_subscriber::prelude::*;
    let subscriber = tracing_subscriber::Registry::default().with(TimingLayer);
    tracing::subscriber::set_global_default(subscriber).context("Tracing already initialised")
}
