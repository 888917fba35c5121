use anyhow::Context;
use audsplit::audio::{
    AudioSource, BufferSource, FrameReader, LimitedSource, RawFileSource, RecordingSource,
    WavFileSource,
};
use audsplit::cli::Cli;
use audsplit::config::Config;
use audsplit::output::{self, DurationFormat};
use audsplit::split::{SplitConfig, split_with};
use clap::Parser;
use std::io::Read;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    cli.apply_to(&mut config);
    config.validate()?;

    run(&cli, &config)
}

/// Route log output to stderr so event lines on stdout stay clean.
fn init_tracing(verbosity: u8) {
    let default_directive = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let split_config = config.detection.split_config()?;

    let mut source = open_source(cli, config)?;
    if let Some(max_read) = config.input.max_read {
        source = Box::new(LimitedSource::new(source, max_read)?);
    }

    if config.needs_recording() {
        let recorder = RecordingSource::new(source);
        let mut reader = FrameReader::from_duration(recorder, config.detection.analysis_window)?;
        process(&mut reader, cli.quiet, config, &split_config)?;
        if let Some(path) = &config.output.save_stream {
            reader.rewind().context("rewinding recorded stream")?;
            let (sampling_rate, sample_width, channels) = (
                reader.sampling_rate(),
                reader.sample_width(),
                reader.channels(),
            );
            let data = reader
                .source()
                .data()
                .context("no recorded data available")?
                .to_vec();
            output::save_stream(path, &data, sampling_rate, sample_width, channels)?;
            tracing::info!(path = path.as_str(), bytes = data.len(), "saved captured stream");
        }
    } else {
        let mut reader = FrameReader::from_duration(source, config.detection.analysis_window)?;
        process(&mut reader, cli.quiet, config, &split_config)?;
    }
    Ok(())
}

/// Opens the input as a boxed byte source: WAV by extension, stdin for
/// "-", headerless raw PCM otherwise.
fn open_source(cli: &Cli, config: &Config) -> anyhow::Result<Box<dyn AudioSource>> {
    if cli.input.as_os_str() == "-" {
        let mut bytes = Vec::new();
        std::io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("reading raw audio from stdin")?;
        let frame_width = config.input.sample_width as usize * config.input.channels as usize;
        bytes.truncate(bytes.len() - bytes.len() % frame_width);
        let source = BufferSource::new(
            bytes,
            config.input.sampling_rate,
            config.input.sample_width,
            config.input.channels,
        )?;
        return Ok(Box::new(source));
    }
    let is_wav = cli
        .input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
    if is_wav {
        Ok(Box::new(WavFileSource::open(&cli.input)?))
    } else {
        Ok(Box::new(RawFileSource::open(
            &cli.input,
            config.input.sampling_rate,
            config.input.sample_width,
            config.input.channels,
        )?))
    }
}

/// Runs detection, printing one line per event and saving events as they
/// are finalized.
fn process<S: AudioSource>(
    reader: &mut FrameReader<S>,
    quiet: bool,
    config: &Config,
    split_config: &SplitConfig,
) -> anyhow::Result<()> {
    let time_format = DurationFormat::parse(&config.output.time_format)?;
    let mut id = 0usize;
    let mut save_error: Option<audsplit::AudsplitError> = None;
    split_with(reader, split_config, |event| {
        id += 1;
        if !quiet {
            println!(
                "{}",
                output::format_event_line(&config.output.print_format, id, &event, &time_format)
            );
        }
        if let Some(template) = &config.output.save_detections_as
            && save_error.is_none()
        {
            let filename = output::event_filename(template, id, &event);
            match output::save_event(&filename, &event) {
                Ok(()) => tracing::debug!(id, filename = filename.as_str(), "saved detection"),
                Err(err) => save_error = Some(err),
            }
        }
    })?;
    match save_error {
        Some(err) => Err(err).context("saving detections"),
        None => Ok(()),
    }
}
