use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use axum_extra::extract::cookie::CookieJar;
use futures::stream::Stream;
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, routes::current_actor},
    app_error::AppResult,
    infra::notify::{NotificationHub, UserQueue},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/stream", get(stream_notifications))
}

/// Removes the session's queue when the stream is dropped; publishes after
/// that point are dropped by the hub, not buffered.
struct QueueGuard {
    hub: Arc<NotificationHub>,
    user_id: Uuid,
}

impl Drop for QueueGuard {
    fn drop(&mut self) {
        self.hub.remove(self.user_id);
    }
}

/// Streams the caller's notifications as server-sent events. The queue is
/// acquired for the lifetime of the connection and torn down with it.
async fn stream_notifications(
    State(app_state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let actor = current_actor(&jar, &headers, &app_state)?;

    let queue: Arc<UserQueue> = app_state.notification_hub.acquire(actor.id);
    let guard = QueueGuard {
        hub: app_state.notification_hub.clone(),
        user_id: actor.id,
    };

    let stream = futures::stream::unfold((queue, guard), |(queue, guard)| async move {
        let notification = queue.recv().await?;
        let event = Event::default()
            .event("notification")
            .json_data(&notification)
            .ok()?;
        Some((Ok::<_, Infallible>(event), (queue, guard)))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
