use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use rtsp_client::{ClientConfig, Credentials, RtspClient};

#[derive(Parser)]
#[command(
    name = "rtsp-client",
    about = "Stream an MJPEG resource from an RTSP server over RTP/UDP"
)]
struct Args {
    /// Media path on the server (e.g. movie.Mjpeg)
    #[arg(long)]
    host_file_path: String,

    /// Server address
    #[arg(long)]
    host_address: String,

    /// Server RTSP port
    #[arg(long)]
    host_port: u16,

    /// Local UDP port to receive frames on (0 = any)
    #[arg(long)]
    rtp_port: u16,

    /// Username for Digest authentication
    #[arg(long, requires = "rtsp_pw")]
    rtsp_user: Option<String>,

    /// Password for Digest authentication
    #[arg(long, requires = "rtsp_user")]
    rtsp_pw: Option<String>,

    /// User-Agent header
    #[arg(long, default_value = rtsp_client::config::DEFAULT_USER_AGENT)]
    rtsp_user_agent: String,

    /// How long to play before tearing down, in seconds
    #[arg(long, default_value_t = 30)]
    duration: u64,

    /// Write each received frame to this directory as frame_<index>.jpg
    #[arg(long)]
    save_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut config = ClientConfig::new(
        &args.host_file_path,
        &args.host_address,
        args.host_port,
        args.rtp_port,
    );
    config.user_agent = Some(args.rtsp_user_agent.clone());
    if let (Some(user), Some(pw)) = (&args.rtsp_user, &args.rtsp_pw) {
        config.credentials = Some(Credentials::new(user, pw));
    }

    if let Some(dir) = &args.save_dir
        && let Err(e) = fs::create_dir_all(dir)
    {
        eprintln!("Failed to create {}: {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let mut client = RtspClient::new(config);
    match run(&mut client, &args) {
        Ok(frames) => {
            println!("Received {frames} frames");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Streaming failed: {e}");
            client.close();
            ExitCode::FAILURE
        }
    }
}

fn run(client: &mut RtspClient, args: &Args) -> rtsp_client::Result<u64> {
    client.connect()?;
    client.describe_and_authenticate()?;
    client.setup()?;
    client.play()?;

    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut received = 0;
    while Instant::now() < deadline {
        let Some(frame) = client.pull_next_frame() else {
            thread::sleep(Duration::from_millis(10));
            continue;
        };
        received += 1;
        tracing::debug!(index = frame.index, bytes = frame.payload.len(), "frame");

        if let Some(dir) = &args.save_dir {
            let path = dir.join(format!("frame_{:05}.jpg", frame.index));
            if let Err(e) = fs::write(&path, &frame.payload) {
                tracing::warn!(path = %path.display(), error = %e, "failed to save frame");
            }
        }
    }

    let stats = client.receiver_stats();
    tracing::info!(
        frames = stats.frames(),
        framing_errors = stats.framing_errors(),
        datagrams = stats.datagrams(),
        "stream finished"
    );

    client.teardown()?;
    Ok(received)
}
