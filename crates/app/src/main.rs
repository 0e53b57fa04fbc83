use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use clap::{Args, Parser, Subcommand};
use facestream_core::{
    envelope, CooperativeLoop, KeyframeLog, MorphRig, Payload, PollDriver, RigDescriptor, Scene,
    Session, StandaloneHost, StreamConfig, StreamError, ZmqConnector,
};
use tracing_subscriber::EnvFilter;

fn main() -> facestream_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Listen(args) => run_listen(args),
        Commands::Publish {
            input,
            endpoint,
            topic,
            fps,
        } => run_publish(&input, &endpoint, &topic, fps),
    }
}

fn run_listen(args: ListenArgs) -> facestream_core::Result<()> {
    let config = args.stream_config()?;
    tracing::info!(endpoint = %config.subscriber.endpoint(), toggles = ?config.toggles, "starting listener");

    let mut scene = Scene::new();
    for descriptor in load_rigs(&args.rigs)? {
        scene.add(MorphRig::new(&descriptor));
    }
    scene.select_all();
    let mut host = StandaloneHost::new(scene, KeyframeLog::at_frame(args.start_frame));

    let mut session = Session::new(config.clone());
    let mut driver = PollDriver::new(&config);
    let mut scheduler = CooperativeLoop::new();
    session.connect(&mut ZmqConnector::new(), &host, &mut scheduler)?;

    let deadline = args
        .duration_secs
        .map(|secs| Instant::now() + Duration::from_secs_f64(secs));
    scheduler.run_until(&mut driver, &mut session, &mut host, |_, _| {
        deadline.is_some_and(|deadline| Instant::now() >= deadline)
    });
    session.disconnect(&mut scheduler);

    let stats = driver.stats();
    tracing::info!(
        ticks = stats.ticks,
        frames = stats.frames,
        rejected = stats.rejected,
        mutations = stats.mutations,
        keyframes = stats.keyframes,
        "listener stopped"
    );

    if let Some(path) = args.dump_keyframes {
        let file = File::create(&path)?;
        serde_json::to_writer_pretty(file, host.timeline.records())
            .map_err(|err| StreamError::msg(format!("writing {}: {err}", path.display())))?;
        tracing::info!(path = %path.display(), "keyframes written");
    }
    Ok(())
}

fn load_rigs(paths: &[PathBuf]) -> facestream_core::Result<Vec<RigDescriptor>> {
    if paths.is_empty() {
        return Ok(vec![RigDescriptor::open("face")]);
    }
    paths
        .iter()
        .map(|path| {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw)
                .map_err(|err| StreamError::Config(format!("{}: {err}", path.display())))
        })
        .collect()
}

/// Replays one JSON payload per line through a PUB socket.
fn run_publish(input: &Path, endpoint: &str, topic: &str, fps: f64) -> facestream_core::Result<()> {
    if fps <= 0.0 {
        return Err(StreamError::Config("fps must be positive".into()));
    }
    let context = zmq::Context::new();
    let socket = context.socket(zmq::PUB)?;
    socket.connect(endpoint)?;
    // Give the subscription time to propagate before the first frame.
    thread::sleep(Duration::from_millis(200));

    let frame_time = Duration::from_secs_f64(1.0 / fps);
    let reader = BufReader::new(File::open(input)?);
    let mut sent = 0usize;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let payload: Payload = serde_json::from_str(&line)?;
        let parts = envelope::encode(topic.as_bytes(), timestamp().as_bytes(), &payload)?;
        socket.send_multipart(parts, 0)?;
        sent += 1;
        tracing::debug!(frame = payload.frame, "published frame");
        thread::sleep(frame_time);
    }

    tracing::info!(sent, endpoint, "publishing finished");
    Ok(())
}

fn timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| format!("{:.6}", elapsed.as_secs_f64()))
        .unwrap_or_default()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Streams facial animation frames onto rigs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bind a subscriber and apply incoming frames to in-memory rigs.
    Listen(ListenArgs),
    /// Publish JSON-lines payloads to a listening subscriber.
    Publish {
        /// File with one payload object per line.
        input: PathBuf,
        #[arg(long, default_value = "tcp://127.0.0.1:5572")]
        endpoint: String,
        #[arg(long, default_value = "facsvatar")]
        topic: String,
        #[arg(long, default_value_t = 30.0)]
        fps: f64,
    },
}

#[derive(Args, Debug)]
struct ListenArgs {
    /// JSON configuration file; flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Keep the targets selected at connect time.
    #[arg(long)]
    static_targets: bool,
    #[arg(long)]
    no_blendshapes: bool,
    #[arg(long)]
    no_rotation: bool,
    #[arg(long)]
    mirror: bool,
    /// Insert keyframes for applied channels.
    #[arg(long)]
    record: bool,
    /// Rig descriptor JSON files. Defaults to one open rig named `face`.
    #[arg(long = "rig")]
    rigs: Vec<PathBuf>,
    /// Timeline position frames are anchored to.
    #[arg(long, default_value_t = 1)]
    start_frame: i64,
    /// Stop after this many seconds instead of running until killed.
    #[arg(long)]
    duration_secs: Option<f64>,
    /// Write recorded keyframes as JSON on exit.
    #[arg(long)]
    dump_keyframes: Option<PathBuf>,
}

impl ListenArgs {
    fn stream_config(&self) -> facestream_core::Result<StreamConfig> {
        let mut config = match &self.config {
            Some(path) => StreamConfig::load(path)?,
            None => StreamConfig::default(),
        };
        if let Some(host) = &self.host {
            config.subscriber.host = host.clone();
        }
        if let Some(port) = self.port {
            config.subscriber.port = port;
        }
        if let Some(interval) = self.interval_ms {
            config.poll_interval_ms = interval;
        }
        let toggles = &mut config.toggles;
        toggles.dynamic_targeting &= !self.static_targets;
        toggles.facial_configuration &= !self.no_blendshapes;
        toggles.rotate_head &= !self.no_rotation;
        toggles.mirror_head |= self.mirror;
        toggles.keyframing |= self.record;

        config.validate()?;
        Ok(config)
    }
}
