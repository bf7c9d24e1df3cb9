use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    ledger::{Collector, Entry, ExitError},
    protocol::{
        connection::{Connection, ConnectionErr},
        message::{DecodeError, Event, EventKind, Message},
    },
    stats::Statistics,
};

/// Serves a single booth until it disconnects
///
/// bad records are reported and acknowledged like any other record,
/// only a transport failure ends the session with an error.
pub async fn handle<S>(mut conn: Connection<S>, collector: Collector) -> Result<(), ConnectionErr>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(record) = conn.read_message().await? {
        let stats = match record {
            Ok(Message::Disconnect) => {
                tracing::info!("booth requested to disconnect");
                break;
            }
            Ok(Message::Event(event)) => process_event(&collector, event),
            Err(err) => {
                report_bad_record(&err);
                collector.snapshot()
            }
        };

        conn.send_ack().await?;
        tracing::info!(
            current = stats.current_count,
            total_vehicles = stats.total_vehicles,
            total_fees = stats.total_fees,
            "stats"
        );
    }

    Ok(())
}

fn process_event(collector: &Collector, event: Event) -> Statistics {
    let Event {
        kind,
        plate,
        timestamp,
        booth,
    } = event;

    match kind {
        EventKind::Entry => {
            let (entry, stats) = collector.entry(plate.clone(), booth.clone(), timestamp);
            if let Entry::Replaced(previous) = entry {
                tracing::warn!(
                    %plate,
                    previous_booth = %previous.entry_booth,
                    previous_time = %previous.entry_time,
                    "vehicle is already on the highway, overwriting its entry"
                );
            }
            tracing::info!(%plate, %booth, %timestamp, "entry");

            stats
        }
        EventKind::Exit => {
            let (trip, stats) = collector.exit(&plate, &booth, timestamp);
            match trip {
                Ok(trip) => tracing::info!(
                    %plate,
                    entry_booth = %trip.entry_booth,
                    exit_booth = %booth,
                    %timestamp,
                    fee = trip.fee,
                    "exit"
                ),
                Err(ExitError::NotFound) => {
                    tracing::warn!(
                        %plate,
                        %booth,
                        %timestamp,
                        "exit for an unknown vehicle, ignoring"
                    )
                }
                Err(ExitError::InvalidBooth(err)) => {
                    tracing::warn!(%plate, %booth, %timestamp, "can't charge the vehicle: {}", err)
                }
            }

            stats
        }
    }
}

fn report_bad_record(err: &DecodeError) {
    if err.is_framing() {
        tracing::warn!("received a badly formatted record: {}", err);
    } else {
        tracing::warn!("{}", err);
    }
}
