use crate::error::AppError;
use crate::models::SegmentSet;
use crate::traits::Notifier;

/// Send `segments` through `channel`: header first, then every part.
///
/// Parts are numbered `Part i/n` when there is more than one. The first
/// failing message stops the delivery.
pub async fn deliver_segments<N: Notifier>(
    channel: &N,
    segments: &SegmentSet,
) -> Result<(), AppError> {
    tracing::info!(channel = channel.name(), parts = segments.parts.len(), "Sending notification");

    if !segments.header.trim().is_empty() {
        send(channel, &segments.header).await?;
    }

    let total = segments.parts.len();
    for (i, part) in segments.parts.iter().enumerate() {
        if total > 1 {
            send(channel, &format!("Part {}/{total}\n\n{part}", i + 1)).await?;
        } else {
            send(channel, part).await?;
        }
    }
    Ok(())
}

async fn send<N: Notifier>(channel: &N, text: &str) -> Result<(), AppError> {
    if text.trim().is_empty() {
        return Err(AppError::InvalidInput("Message cannot be empty".into()));
    }
    channel.deliver(text).await.map_err(|e| {
        tracing::error!(channel = channel.name(), error = %e, "Error sending notification");
        AppError::Notification(format!("{} delivery failed: {e}", channel.name()))
    })
}
