use parallel_upload_plots::settings::Settings;
use parallel_upload_plots::tracing::{get_subscriber, init_subscriber};

fn main() -> anyhow::Result<()> {
    let subscriber = get_subscriber("parallel_upload_plots", "warn");
    init_subscriber(subscriber)?;

    let main_span = tracing::info_span!("main");
    let _main_span_guard = main_span.enter();

    let settings = Settings::from_command_line()?;
    parallel_upload_plots::run(&settings)?;
    Ok(())
}
