//! Desktop notifications over the freedesktop notification service.

use std::collections::HashMap;

use tokio::sync::{Mutex, OnceCell};
use zbus::Connection;
use zbus::zvariant::Value;

use super::{LiveNotification, PlatformError};

const DESTINATION: &str = "org.freedesktop.Notifications";
const PATH: &str = "/org/freedesktop/Notifications";
const INTERFACE: &str = "org.freedesktop.Notifications";

/// Server default expiry.
const EXPIRE_DEFAULT: i32 = -1;

/// Sends notifications and remembers the server id issued per key, so a
/// second notification with the same key replaces the first.
pub struct DesktopNotifier {
    app_name: String,
    connection: OnceCell<Connection>,
    ids: Mutex<HashMap<String, u32>>,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            connection: OnceCell::new(),
            ids: Mutex::new(HashMap::new()),
        }
    }

    pub async fn show(
        &self,
        key: &str,
        notification: &LiveNotification,
    ) -> Result<(), PlatformError> {
        let connection = self
            .connection
            .get_or_try_init(|| async { Connection::session().await })
            .await?;

        let mut ids = self.ids.lock().await;
        let replaces_id = ids.get(key).copied().unwrap_or(0);
        let actions: Vec<&str> = Vec::new();
        let hints: HashMap<&str, Value<'_>> = HashMap::new();

        let reply = connection
            .call_method(
                Some(DESTINATION),
                PATH,
                Some(INTERFACE),
                "Notify",
                &(
                    self.app_name.as_str(),
                    replaces_id,
                    "",
                    notification.title.as_str(),
                    notification.message.as_str(),
                    actions,
                    hints,
                    EXPIRE_DEFAULT,
                ),
            )
            .await?;
        let id: u32 = reply.body().deserialize()?;
        ids.insert(key.to_string(), id);

        tracing::debug!(key, id, "Notification shown");
        Ok(())
    }
}
