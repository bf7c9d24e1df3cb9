use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use rand::{seq::SliceRandom, Rng};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    task::JoinSet,
};

use toll_collector::protocol::message::{Event, Message};

/// Simulates toll booths reporting random traffic to a collector.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address of the collector.
    #[arg(long, default_value = "127.0.0.1:31199")]
    server: SocketAddr,

    /// Number of booths, each one connects separately.
    #[arg(long, default_value_t = 76)]
    booths: u32,

    /// Vehicles reported by every booth.
    #[arg(long, default_value_t = 5)]
    transactions: u32,

    /// Vehicles leave through a random booth in 1..=exit-booths.
    #[arg(long, default_value_t = 18)]
    exit_booths: u32,

    #[arg(long, default_value_t = 2000)]
    min_travel_ms: u64,

    #[arg(long, default_value_t = 5000)]
    max_travel_ms: u64,

    #[arg(long, default_value_t = 1000)]
    min_pause_ms: u64,

    #[arg(long, default_value_t = 3000)]
    max_pause_ms: u64,

    /// Delay between starting two booths.
    #[arg(long, default_value_t = 100)]
    stagger_ms: u64,
}

type AckReader = Lines<BufReader<OwnedReadHalf>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Arc::new(Args::parse());
    let mut booths = JoinSet::new();

    for booth in 1..=args.booths {
        booths.spawn(simulate_booth(booth, args.clone()));
        tokio::time::sleep(Duration::from_millis(args.stagger_ms)).await;
    }

    while let Some(result) = booths.join_next().await {
        if let Err(err) = result? {
            tracing::warn!("{:#}", err);
        }
    }

    Ok(())
}

async fn simulate_booth(booth: u32, args: Arc<Args>) -> anyhow::Result<()> {
    let stream = TcpStream::connect(args.server)
        .await
        .with_context(|| format!("booth {} failed to connect", booth))?;
    tracing::info!("booth {} connected to {}", booth, args.server);

    let (reader, mut writer) = stream.into_split();
    let mut acks = BufReader::new(reader).lines();

    for _ in 0..args.transactions {
        let plate = random_plate();

        let entry = Event::entry(plate.clone(), now(), booth);
        send(&mut writer, &mut acks, Message::Event(entry)).await?;

        tokio::time::sleep(random_delay(args.min_travel_ms, args.max_travel_ms)).await;

        let exit = Event::exit(plate, now(), random_exit(booth, args.exit_booths));
        send(&mut writer, &mut acks, Message::Event(exit)).await?;

        tokio::time::sleep(random_delay(args.min_pause_ms, args.max_pause_ms)).await;
    }

    // the collector does not acknowledge a disconnect
    writer
        .write_all(format!("{}\n", Message::Disconnect).as_bytes())
        .await?;
    tracing::info!("booth {} disconnected", booth);

    Ok(())
}

async fn send(
    writer: &mut OwnedWriteHalf,
    acks: &mut AckReader,
    message: Message,
) -> anyhow::Result<()> {
    writer
        .write_all(format!("{}\n", message).as_bytes())
        .await?;
    tracing::info!("sent: {}", message);

    let ack = acks
        .next_line()
        .await?
        .context("the collector closed the connection")?;
    anyhow::ensure!(ack == "ACK", "unexpected acknowledgement: {}", ack);

    Ok(())
}

fn now() -> toll_collector::protocol::message::Timestamp {
    chrono::Local::now().naive_local()
}

// plates look like "ABC-123"
fn random_plate() -> String {
    let mut rng = rand::thread_rng();
    let letters: String = (0..3).map(|_| rng.gen_range(b'A'..=b'Z') as char).collect();
    let digits: String = (0..3).map(|_| rng.gen_range(b'0'..=b'9') as char).collect();
    format!("{}-{}", letters, digits)
}

fn random_exit(entry: u32, exit_booths: u32) -> u32 {
    let candidates: Vec<u32> = (1..=exit_booths).filter(|booth| *booth != entry).collect();
    candidates
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(entry)
}

fn random_delay(min_ms: u64, max_ms: u64) -> Duration {
    let ms = rand::thread_rng().gen_range(min_ms.min(max_ms)..=max_ms);
    Duration::from_millis(ms)
}
