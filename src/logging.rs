use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    EnvFilter,
    fmt::{
        FmtContext, FormatEvent,
        format::{self, Writer},
    },
    registry::LookupSpan,
};

/// Compact one-line events: a level marker, the message and its fields.
pub struct DiscoveryFormatter;

impl<S, N> FormatEvent<S, N> for DiscoveryFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> format::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let symbol = match *event.metadata().level() {
            Level::TRACE => "[ ]",
            Level::DEBUG => "[?]",
            Level::INFO => "[+]",
            Level::WARN => "[*]",
            Level::ERROR => "[-]",
        };
        write!(writer, "{symbol} ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Installs the global subscriber. Logs go to stderr so stdout only carries reports.
/// `RUST_LOG` applies unless `-v` was given.
pub fn init(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(0))),
        v => EnvFilter::new(default_directive(v)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .event_format(DiscoveryFormatter)
        .init();
}
