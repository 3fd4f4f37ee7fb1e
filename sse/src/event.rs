use std::fmt::Write;

/// A single server-sent event.
///
/// An event stream is a simple stream of UTF-8 text data. Messages in
/// the stream are separated by a pair of newline characters; a colon
/// as the first character of a line is in essence a comment and is
/// ignored.
///
/// Sample event stream:
///
/// ```text
/// event: usermessage
/// data: {"username": "bobby", "time": "02:34:11", "text": "Hi everyone."}
/// ```
///
/// Field semantics follow MDN:
/// <https://developer.mozilla.org/en-US/docs/Web/API/Server-sent_events/Using_server-sent_events>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    /// A string identifying the type of event described. The website
    /// source code should use `addEventListener()` to listen for
    /// named events.
    pub event_type: String,

    /// The message payload. Multi-line data is emitted as one `data:`
    /// field per line.
    pub data: Vec<u8>,

    /// Unique event identifier, used by browsers for the
    /// `Last-Event-ID` reconnection header.
    pub id: Option<String>,

    /// Reconnection time in milliseconds. If the connection to the
    /// server is lost, the browser waits this long before attempting
    /// to reconnect.
    pub retry: Option<u64>,
}

impl Event {
    /// Encodes the event into `text/event-stream` format, followed by
    /// the message-terminating blank line.
    pub fn to_stream(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "event: {}", self.event_type);

        if let Some(id) = &self.id {
            let _ = writeln!(out, "id: {id}");
        }

        if let Some(retry) = self.retry {
            let _ = writeln!(out, "retry: {retry}");
        }

        for line in self.data.split(|b| *b == b'\n') {
            let _ = writeln!(out, "data: {}", String::from_utf8_lossy(line));
        }

        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestArgs {
        event: Event,
        want: &'static str,
    }

    fn scenario(args: TestArgs) {
        assert_eq!(args.event.to_stream(), args.want);
    }

    #[test]
    fn minimal_event() {
        scenario(TestArgs {
            event: Event {
                event_type: "usermessage".to_owned(),
                data: br#"{"username": "bobby", "time": "02:34:11", "text": "Hi everyone."}"#
                    .to_vec(),
                ..Default::default()
            },
            want: "event: usermessage\ndata: {\"username\": \"bobby\", \"time\": \"02:34:11\", \"text\": \"Hi everyone.\"}\n\n",
        });
    }

    #[test]
    fn event_with_id() {
        scenario(TestArgs {
            event: Event {
                event_type: "notifyusers".to_owned(),
                data: br#"{"which": "all", "time": "2:34:11", "text": "This is notification."}"#
                    .to_vec(),
                id: Some("someid".to_owned()),
                retry: None,
            },
            want: "event: notifyusers\nid: someid\ndata: {\"which\": \"all\", \"time\": \"2:34:11\", \"text\": \"This is notification.\"}\n\n",
        });
    }

    #[test]
    fn multiline_data_with_id_and_retry_value() {
        scenario(TestArgs {
            event: Event {
                event_type: "hugevent".to_owned(),
                data: b"one\ntwo\nthree".to_vec(),
                id: Some("someotherid".to_owned()),
                retry: Some(2137),
            },
            want: "event: hugevent\nid: someotherid\nretry: 2137\ndata: one\ndata: two\ndata: three\n\n",
        });
    }
}
