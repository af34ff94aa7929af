use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Per-button settings blob as stored by the host.
///
/// Flat key/value mapping; never merged, always replaced wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Settings(Map<String, Value>);

impl Settings {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Target scene name.
    pub fn scene(&self) -> Option<String> {
        self.ident("scene")
    }

    /// Identifier of the item to fade.
    pub fn source(&self) -> Option<String> {
        self.ident("source")
    }

    /// Optional key title shown on the button.
    pub fn title(&self) -> Option<&str> {
        self.0
            .get("title")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Read a non-empty string or a number as an identifier.
    fn ident(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Settings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Object(map) => Ok(Self(map)),
            _ => Ok(Self::default()),
        }
    }
}

/// Events delivered by the host over the plugin websocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum HostEvent {
    /// A key with this action became visible; carries saved settings.
    WillAppear(ActionEvent),

    /// The key is no longer visible.
    WillDisappear(ActionEvent),

    /// A key was released.
    KeyUp(ActionEvent),

    /// Settings for a key changed.
    DidReceiveSettings(ActionEvent),

    /// Free-form message from the property inspector.
    SendToPlugin(InspectorMessage),

    PropertyInspectorDidAppear(InspectorEvent),

    PropertyInspectorDidDisappear(InspectorEvent),

    /// Anything this plugin does not subscribe to.
    #[serde(other)]
    Other,
}

impl HostEvent {
    /// Decode a raw websocket text frame.
    ///
    /// # Errors
    /// Returns `PluginError::Json` if the frame is not a host event.
    pub fn decode(text: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::WillAppear(_) => "willAppear",
            Self::WillDisappear(_) => "willDisappear",
            Self::KeyUp(_) => "keyUp",
            Self::DidReceiveSettings(_) => "didReceiveSettings",
            Self::SendToPlugin(_) => "sendToPlugin",
            Self::PropertyInspectorDidAppear(_) => "propertyInspectorDidAppear",
            Self::PropertyInspectorDidDisappear(_) => "propertyInspectorDidDisappear",
            Self::Other => "other",
        }
    }
}

/// An event addressed to one placed key.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionEvent {
    #[serde(default)]
    pub action: String,
    pub context: String,
    #[serde(default)]
    pub device: String,
    #[serde(default)]
    pub payload: ActionPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionPayload {
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InspectorEvent {
    #[serde(default)]
    pub action: String,
    pub context: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InspectorMessage {
    #[serde(default)]
    pub action: String,
    pub context: String,
    #[serde(default)]
    pub payload: Value,
}

impl InspectorMessage {
    /// The `sdpi_collection` key/value pair, when it carries a value.
    ///
    /// `null`, `false`, `0` and `""` count as no value.
    pub fn sdpi_value(&self) -> Option<(&str, &Value)> {
        let collection = self.payload.get("sdpi_collection")?;
        let key = collection.get("key").and_then(Value::as_str).unwrap_or_default();
        let value = collection.get("value")?;
        let present = match value {
            Value::Null | Value::Bool(false) => false,
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => n.as_f64() != Some(0.0),
            _ => true,
        };
        present.then_some((key, value))
    }
}

/// Commands sent back to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum HostCommand {
    SetTitle {
        context: String,
        payload: TitlePayload,
    },
    ShowAlert {
        context: String,
    },
    ShowOk {
        context: String,
    },
    LogMessage {
        payload: LogPayload,
    },
}

impl HostCommand {
    pub fn set_title(context: &str, title: &str) -> Self {
        Self::SetTitle {
            context: context.to_string(),
            payload: TitlePayload {
                title: title.to_string(),
                target: 0,
            },
        }
    }

    pub fn log(message: impl Into<String>) -> Self {
        Self::LogMessage {
            payload: LogPayload {
                message: message.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitlePayload {
    pub title: String,
    /// 0 = hardware and software.
    pub target: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogPayload {
    pub message: String,
}

/// First frame sent after connecting to the host.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub event: String,
    pub uuid: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_key_up() {
        let text = r#"{
            "action": "com.scenefade.fade",
            "event": "keyUp",
            "context": "ctx-1",
            "device": "dev-1",
            "payload": {
                "settings": { "scene": "Gaming", "source": "item-42" },
                "coordinates": { "column": 0, "row": 1 },
                "isInMultiAction": false
            }
        }"#;
        let HostEvent::KeyUp(ev) = HostEvent::decode(text).unwrap() else {
            panic!("expected keyUp");
        };
        assert_eq!(ev.context, "ctx-1");
        assert_eq!(ev.payload.settings.scene().as_deref(), Some("Gaming"));
        assert_eq!(ev.payload.settings.source().as_deref(), Some("item-42"));
    }

    #[test]
    fn missing_settings_default_to_empty() {
        let text = r#"{"event":"didReceiveSettings","context":"c","payload":{}}"#;
        let HostEvent::DidReceiveSettings(ev) = HostEvent::decode(text).unwrap() else {
            panic!("expected didReceiveSettings");
        };
        assert!(ev.payload.settings.is_empty());

        let text = r#"{"event":"willAppear","context":"c","payload":{"settings":null}}"#;
        let HostEvent::WillAppear(ev) = HostEvent::decode(text).unwrap() else {
            panic!("expected willAppear");
        };
        assert!(ev.payload.settings.is_empty());
    }

    #[test]
    fn unknown_events_decode_as_other() {
        let text = r#"{"event":"deviceDidConnect","device":"d","deviceInfo":{}}"#;
        assert!(matches!(HostEvent::decode(text).unwrap(), HostEvent::Other));
        assert!(HostEvent::decode("not json").is_err());
    }

    #[test]
    fn numeric_source_reads_as_ident() {
        let settings: Settings = serde_json::from_value(json!({"source": 42, "scene": ""})).unwrap();
        assert_eq!(settings.source().as_deref(), Some("42"));
        assert_eq!(settings.scene(), None);
    }

    #[test]
    fn sdpi_value_requires_present_value() {
        let msg = |payload: Value| InspectorMessage {
            action: String::new(),
            context: "c".into(),
            payload,
        };
        let with = msg(json!({"sdpi_collection": {"key": "scene", "value": "Gaming"}}));
        assert_eq!(with.sdpi_value(), Some(("scene", &json!("Gaming"))));

        let empty = msg(json!({"sdpi_collection": {"key": "scene", "value": ""}}));
        assert_eq!(empty.sdpi_value(), None);
        assert_eq!(msg(json!({})).sdpi_value(), None);

        let zero = msg(json!({"sdpi_collection": {"key": "source", "value": 0}}));
        assert_eq!(zero.sdpi_value(), None);
        let zero = msg(json!({"sdpi_collection": {"key": "source", "value": 0.0}}));
        assert_eq!(zero.sdpi_value(), None);
        let number = msg(json!({"sdpi_collection": {"key": "source", "value": 42}}));
        assert_eq!(number.sdpi_value(), Some(("source", &json!(42))));
    }

    #[test]
    fn commands_serialize_in_host_format() {
        let cmd = HostCommand::set_title("ctx", "Fade");
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            json!({"event": "setTitle", "context": "ctx", "payload": {"title": "Fade", "target": 0}})
        );
        let cmd = HostCommand::ShowAlert {
            context: "ctx".into(),
        };
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            json!({"event": "showAlert", "context": "ctx"})
        );
    }
}
