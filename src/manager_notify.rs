use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeDelta, Timelike};
use log::{error, info, warn};
use crate::extractor::{extract, Target};
use crate::manager_gemini::Gemini;
use crate::manager_sheet::models::{SubscriberEntry, SubscriberKind};
use crate::manager_sheet::SheetStore;
use crate::schedule::{api_times, kst_now, Mode};

/// Outbound channel delivery, injected so broadcast isolation is testable
#[async_trait]
pub trait ChannelSender: Send + Sync {
    async fn send_channel(&self, channel_id: &str, text: &str) -> Result<(), String>;
}

/// Sends one message to every channel, isolating failures per channel:
/// a refused or missing channel is logged and the rest still get theirs.
/// Returns the number of successful deliveries.
///
/// # Arguments
///
/// * 'sender' - delivery collaborator
/// * 'channels' - Public subscriber entries to deliver to
/// * 'text' - the message
pub async fn broadcast(
    sender: &dyn ChannelSender,
    channels: &[SubscriberEntry],
    text: &str,
) -> usize {
    let mut delivered = 0;
    for channel in channels {
        match sender.send_channel(&channel.id, text).await {
            Ok(()) => {
                info!("delivered to channel {}", channel.id);
                delivered += 1;
            }
            Err(e) => warn!("delivery to channel {} failed: {}", channel.id, e),
        }
    }
    delivered
}

/// Morning notification loop: once a day at the configured KST time, compose
/// the 07:00 forecast message and broadcast it to all Public channels
///
/// # Arguments
///
/// * 'sender' - delivery collaborator
/// * 'sheets' - forecast cache and subscriber registry
/// * 'gemini' - message composer
/// * 'hour' / 'minute' - daily trigger time in KST
/// * 'publication_delay' - forwarded to the schedule resolver
pub async fn run_morning(
    sender: Arc<dyn ChannelSender>,
    sheets: Arc<SheetStore>,
    gemini: Arc<Gemini>,
    hour: u32,
    minute: u32,
    publication_delay: u32,
) {
    loop {
        let pause = until_daily(kst_now(), hour, minute);
        tokio::time::sleep(pause).await;

        if let Err(e) = morning_once(sender.as_ref(), &sheets, &gemini, publication_delay).await {
            error!("morning broadcast aborted: {}", e);
        }
    }
}

async fn morning_once(
    sender: &dyn ChannelSender,
    sheets: &SheetStore,
    gemini: &Gemini,
    publication_delay: u32,
) -> Result<(), String> {
    let times = api_times(kst_now(), Mode::Morning, publication_delay);

    let subscribers = sheets.read_subscribers().await.map_err(|e| e.to_string())?;
    let channels: Vec<SubscriberEntry> = subscribers
        .into_iter()
        .filter(|s| s.kind == SubscriberKind::Public)
        .collect();
    if channels.is_empty() {
        info!("no public channels subscribed, skipping morning broadcast");
        return Ok(());
    }

    // the broadcast location is whatever the first public channel is set to
    let lead = &channels[0];
    let (grid_x, grid_y) = match (lead.grid_x, lead.grid_y) {
        (Some(x), Some(y)) => (x, y),
        _ => return Err(format!("public channel {} has no grid coordinates", lead.id)),
    };

    let rows = sheets.read_forecast().await.map_err(|e| e.to_string())?;
    let target = Target {
        date: times.forecast_date.clone(),
        time_slot: times.forecast_time.clone(),
        grid_x,
        grid_y,
    };
    let data = extract(&rows, &target, &times.forecast_label).map_err(|e| e.to_string())?;

    let message = gemini.policy_message(&data, &lead.location_name).await;

    let delivered = broadcast(sender, &channels, &message).await;
    info!("morning broadcast delivered to {}/{} channels", delivered, channels.len());

    Ok(())
}

/// Duration until the next daily trigger at hour:minute in the given clock
fn until_daily(now: DateTime<FixedOffset>, hour: u32, minute: u32) -> Duration {
    let mut next = now
        .with_hour(hour).unwrap()
        .with_minute(minute).unwrap()
        .with_second(0).unwrap()
        .with_nanosecond(0).unwrap();

    if next <= now {
        next += TimeDelta::days(1);
    }

    (next - now).to_std().unwrap_or(Duration::from_secs(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use chrono::TimeZone;

    struct FlakySender {
        fail_for: String,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChannelSender for FlakySender {
        async fn send_channel(&self, channel_id: &str, _text: &str) -> Result<(), String> {
            if channel_id == self.fail_for {
                return Err("channel not found".to_string());
            }
            self.sent.lock().unwrap().push(channel_id.to_string());
            Ok(())
        }
    }

    fn channel(id: &str) -> SubscriberEntry {
        SubscriberEntry {
            kind: SubscriberKind::Public,
            id: id.to_string(),
            location_name: "서울".to_string(),
            grid_x: Some(60),
            grid_y: Some(127),
        }
    }

    #[tokio::test]
    async fn one_failing_channel_does_not_abort_the_rest() {
        let sender = FlakySender {
            fail_for: "ch2".to_string(),
            sent: Mutex::new(Vec::new()),
        };
        let channels = vec![channel("ch1"), channel("ch2"), channel("ch3")];

        let delivered = broadcast(&sender, &channels, "아침 날씨").await;

        assert_eq!(delivered, 2);
        assert_eq!(*sender.sent.lock().unwrap(), vec!["ch1", "ch3"]);
    }

    #[test]
    fn daily_trigger_rolls_to_tomorrow_when_past() {
        let kst = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = kst.with_ymd_and_hms(2026, 3, 2, 7, 0, 0).unwrap();
        assert_eq!(
            until_daily(now, 6, 50),
            Duration::from_secs(23 * 3600 + 50 * 60)
        );

        let now = kst.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap();
        assert_eq!(until_daily(now, 6, 50), Duration::from_secs(50 * 60));
    }
}
