//! WebSocket-based live reload.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Path of the live reload WebSocket endpoint.
pub const LIVERELOAD_PATH: &str = "/__livereload";

/// Path of the client script injected into served pages.
pub const LIVERELOAD_SCRIPT_PATH: &str = "/__livereload.js";

/// Messages sent to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Connection established
    Connected,

    /// Full page reload
    Reload,

    /// Stylesheets changed; refetch them without reloading the page
    Css,
}

/// Hub for broadcasting reload messages to all connected clients.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    /// Create a new reload hub.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected clients.
    pub fn send(&self, msg: ReloadMessage) {
        // No receivers just means no browser is open
        let _ = self.sender.send(msg);
    }

    /// Subscribe to reload messages.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert the client script tag before `</body>`, or append it when the
/// page has no body close tag.
pub fn inject_client(html: &str) -> String {
    let tag = format!(r#"<script src="{}"></script>"#, LIVERELOAD_SCRIPT_PATH);

    match html.rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..pos]);
            out.push_str(&tag);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{}{}", html, tag),
    }
}

/// Generate the client-side live reload script.
///
/// The socket URL is derived from `location.host`, so the script works on
/// whatever host and port the server was bound to.
pub fn livereload_client_script() -> String {
    format!(
        r#"
(function() {{
  'use strict';

  const url = (location.protocol === 'https:' ? 'wss://' : 'ws://') + location.host + '{}';
  let reconnectAttempts = 0;
  const maxReconnectAttempts = 10;

  function refreshStyles() {{
    document.querySelectorAll('link[rel="stylesheet"]').forEach(function(link) {{
      const href = link.href.replace(/[?&]livereload=\d+/, '');
      const sep = href.indexOf('?') === -1 ? '?' : '&';
      link.href = href + sep + 'livereload=' + Date.now();
    }});
  }}

  function connect() {{
    const ws = new WebSocket(url);

    ws.onopen = function() {{
      reconnectAttempts = 0;
    }};

    ws.onmessage = function(event) {{
      const msg = JSON.parse(event.data);

      switch (msg.type) {{
        case 'reload':
          location.reload();
          break;

        case 'css':
          refreshStyles();
          break;

        case 'connected':
          console.log('[livereload] connected');
          break;
      }}
    }};

    ws.onclose = function() {{
      if (reconnectAttempts < maxReconnectAttempts) {{
        reconnectAttempts++;
        setTimeout(connect, 1000 * reconnectAttempts);
      }}
    }};
  }}

  connect();
}})();
"#,
        LIVERELOAD_PATH
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_broadcasts_messages() {
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();

        hub.send(ReloadMessage::Reload);

        match rx.try_recv() {
            Ok(ReloadMessage::Reload) => {}
            other => panic!("Expected Reload message, got {:?}", other),
        }
    }

    #[test]
    fn send_without_subscribers_is_fine() {
        let hub = ReloadHub::new();
        assert_eq!(hub.subscriber_count(), 0);
        hub.send(ReloadMessage::Css);
    }

    #[test]
    fn serializes_messages() {
        assert_eq!(
            serde_json::to_string(&ReloadMessage::Reload).unwrap(),
            r#"{"type":"reload"}"#
        );
        assert_eq!(
            serde_json::to_string(&ReloadMessage::Css).unwrap(),
            r#"{"type":"css"}"#
        );
    }

    #[test]
    fn injects_before_body_close() {
        let html = "<html><body><p>hi</p></body></html>";

        assert_eq!(
            inject_client(html),
            "<html><body><p>hi</p><script src=\"/__livereload.js\"></script></body></html>"
        );
    }

    #[test]
    fn appends_when_body_close_is_missing() {
        assert_eq!(
            inject_client("<p>fragment</p>"),
            "<p>fragment</p><script src=\"/__livereload.js\"></script>"
        );
    }

    #[test]
    fn client_script_targets_the_socket_path() {
        assert!(livereload_client_script().contains("/__livereload'"));
    }
}
