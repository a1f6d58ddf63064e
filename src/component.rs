//! Producer component kinds.
//!
//! Every priority channel is tagged with the kind of producer that owns
//! it. The set is closed and small, so it is a plain enum rather than a
//! trait object.

const COMPONENT_NAME_ALL: &str = "all";
const COMPONENT_NAME_SMOOTHING: &str = "smoothing";
const COMPONENT_NAME_BLACK_BORDER: &str = "blackborder";
const COMPONENT_NAME_FORWARDER: &str = "forwarder";
const COMPONENT_NAME_BOBLIGHT: &str = "boblightserver";
const COMPONENT_NAME_GRABBER: &str = "grabber";
const COMPONENT_NAME_V4L: &str = "v4l";
const COMPONENT_NAME_COLOR: &str = "color";
const COMPONENT_NAME_IMAGE: &str = "image";
const COMPONENT_NAME_EFFECT: &str = "effect";
const COMPONENT_NAME_PROTO_SERVER: &str = "protoserver";
const COMPONENT_NAME_FLATBUF_SERVER: &str = "flatbufserver";
const COMPONENT_NAME_UDP_LISTENER: &str = "udplistener";
const COMPONENT_NAME_BACKGROUND: &str = "background";

/// Kind of producer behind a priority channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    All,
    Smoothing,
    BlackBorder,
    Forwarder,
    BobLightServer,
    Grabber,
    V4lCapture,
    Color,
    Image,
    Effect,
    ProtoServer,
    FlatBufServer,
    UdpListener,
    Background,
}

impl Component {
    /// Diagnostic name of the component.
    pub const fn name(self) -> &'static str {
        match self {
            Self::All => COMPONENT_NAME_ALL,
            Self::Smoothing => COMPONENT_NAME_SMOOTHING,
            Self::BlackBorder => COMPONENT_NAME_BLACK_BORDER,
            Self::Forwarder => COMPONENT_NAME_FORWARDER,
            Self::BobLightServer => COMPONENT_NAME_BOBLIGHT,
            Self::Grabber => COMPONENT_NAME_GRABBER,
            Self::V4lCapture => COMPONENT_NAME_V4L,
            Self::Color => COMPONENT_NAME_COLOR,
            Self::Image => COMPONENT_NAME_IMAGE,
            Self::Effect => COMPONENT_NAME_EFFECT,
            Self::ProtoServer => COMPONENT_NAME_PROTO_SERVER,
            Self::FlatBufServer => COMPONENT_NAME_FLATBUF_SERVER,
            Self::UdpListener => COMPONENT_NAME_UDP_LISTENER,
            Self::Background => COMPONENT_NAME_BACKGROUND,
        }
    }

    /// Parse a component from its diagnostic name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            COMPONENT_NAME_ALL => Self::All,
            COMPONENT_NAME_SMOOTHING => Self::Smoothing,
            COMPONENT_NAME_BLACK_BORDER => Self::BlackBorder,
            COMPONENT_NAME_FORWARDER => Self::Forwarder,
            COMPONENT_NAME_BOBLIGHT => Self::BobLightServer,
            COMPONENT_NAME_GRABBER => Self::Grabber,
            COMPONENT_NAME_V4L => Self::V4lCapture,
            COMPONENT_NAME_COLOR => Self::Color,
            COMPONENT_NAME_IMAGE => Self::Image,
            COMPONENT_NAME_EFFECT => Self::Effect,
            COMPONENT_NAME_PROTO_SERVER => Self::ProtoServer,
            COMPONENT_NAME_FLATBUF_SERVER => Self::FlatBufServer,
            COMPONENT_NAME_UDP_LISTENER => Self::UdpListener,
            COMPONENT_NAME_BACKGROUND => Self::Background,
            _ => return None,
        })
    }
}
