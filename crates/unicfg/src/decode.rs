//! Decoding values into caller-supplied targets.
//!
//! A target advertises what it can do through the `as_*` accessors of
//! [`DecodeTarget`]. The dispatcher walks a fixed ladder of steps and the
//! first accessor that answers wins:
//!
//! 1. the target decodes itself ([`Decoder`])
//! 2. the target decodes itself with a context ([`ContextDecoder`], then [`ConfigDecoder`])
//! 3. the target is a primitive slot ([`ScalarTarget`])
//! 4. otherwise the value is marshalled to JSON and handed to
//!    [`DecodeTarget::decode_interchange`]

use crate::error::ConfigError;
use crate::value::Value;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Ambient request state passed to context-aware decoders.
///
/// The dispatcher never inspects it; it is carried through unchanged.
#[derive(Debug, Clone)]
pub struct DecodeContext {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl DecodeContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::new(CancellationToken::new())
    }

    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Whether the deadline, if any, has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

impl Default for DecodeContext {
    fn default() -> Self {
        Self::background()
    }
}

/// A target that decodes itself from a value.
pub trait Decoder {
    fn decode(&mut self, value: &Value) -> Result<(), ConfigError>;
}

/// A target that decodes itself from a value, given a context.
pub trait ContextDecoder {
    fn decode(&mut self, ctx: &DecodeContext, value: &Value) -> Result<(), ConfigError>;
}

/// Same capability as [`ContextDecoder`] under the name some hosts use.
pub trait ConfigDecoder {
    fn decode_config(&mut self, ctx: &DecodeContext, value: &Value) -> Result<(), ConfigError>;
}

/// A primitive slot filled by the matching extractor.
///
/// Narrower integers are range checked. A [`Duration`] is read as a count of
/// nanoseconds.
#[derive(Debug)]
pub enum ScalarTarget<'a> {
    Bytes(&'a mut Vec<u8>),
    String(&'a mut String),
    Bool(&'a mut bool),
    Duration(&'a mut Duration),
    Isize(&'a mut isize),
    I8(&'a mut i8),
    I16(&'a mut i16),
    I32(&'a mut i32),
    I64(&'a mut i64),
    Usize(&'a mut usize),
    U8(&'a mut u8),
    U16(&'a mut u16),
    U32(&'a mut u32),
    U64(&'a mut u64),
}

/// Something a [`Value`] can be decoded into.
///
/// Every accessor defaults to "not supported"; implement the ones that apply.
/// Targets that implement none of them must override
/// [`DecodeTarget::decode_interchange`].
pub trait DecodeTarget {
    fn as_decoder(&mut self) -> Option<&mut dyn Decoder> {
        None
    }

    fn as_context_decoder(&mut self) -> Option<&mut dyn ContextDecoder> {
        None
    }

    fn as_config_decoder(&mut self) -> Option<&mut dyn ConfigDecoder> {
        None
    }

    fn as_scalar(&mut self) -> Option<ScalarTarget<'_>> {
        None
    }

    /// Fill the target from the JSON encoding of the value.
    fn decode_interchange(&mut self, _payload: &[u8]) -> Result<(), serde_json::Error> {
        Err(<serde_json::Error as serde::de::Error>::custom(
            "target does not accept structural decoding",
        ))
    }
}

macro_rules! scalar_targets {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl DecodeTarget for $ty {
                fn as_scalar(&mut self) -> Option<ScalarTarget<'_>> {
                    Some(ScalarTarget::$variant(self))
                }
            }
        )*
    };
}

scalar_targets! {
    Vec<u8> => Bytes,
    String => String,
    bool => Bool,
    Duration => Duration,
    isize => Isize,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    usize => Usize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
}

/// Decodes through serde, for any deserializable type.
///
/// ```
/// # use unicfg::{ConfigLoader, Loader, Structural};
/// # use indexmap::IndexMap;
/// # use std::path::Path;
/// let mut files = IndexMap::new();
/// files.insert("app.yaml".to_string(), b"ports: [80, 443]\n".to_vec());
/// let root = Loader::new().load(Path::new(""), &files)?;
///
/// let mut ports: Vec<u16> = Vec::new();
/// root.lookup(["ports"]).0.decode(&mut Structural(&mut ports))?;
/// assert_eq!(ports, vec![80, 443]);
/// # Ok::<(), unicfg::ConfigError>(())
/// ```
pub struct Structural<'a, T>(pub &'a mut T);

impl<T: DeserializeOwned> DecodeTarget for Structural<'_, T> {
    fn decode_interchange(&mut self, payload: &[u8]) -> Result<(), serde_json::Error> {
        *self.0 = serde_json::from_slice(payload)?;
        Ok(())
    }
}

impl<T: fmt::Debug> fmt::Debug for Structural<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Structural").field(&self.0).finish()
    }
}

/// `None` when the target does not support the step.
type StepFn =
    fn(&Value, Option<&DecodeContext>, &mut dyn DecodeTarget) -> Option<Result<(), ConfigError>>;

struct Step {
    name: &'static str,
    run: StepFn,
}

const LADDER: &[Step] = &[
    Step {
        name: "decoder",
        run: via_decoder,
    },
    Step {
        name: "context_decoder",
        run: via_context_decoder,
    },
    Step {
        name: "config_decoder",
        run: via_config_decoder,
    },
    Step {
        name: "scalar",
        run: via_scalar,
    },
];

pub(crate) fn dispatch(
    value: &Value,
    ctx: Option<&DecodeContext>,
    target: &mut dyn DecodeTarget,
) -> Result<(), ConfigError> {
    for step in LADDER {
        if let Some(result) = (step.run)(value, ctx, &mut *target) {
            trace!(step = step.name, path = %value.path(), "decoded value");
            return result;
        }
    }
    trace!(step = "structural", path = %value.path(), "decoded value");
    structural(value, target)
}

fn at_position(value: &Value, source: ConfigError) -> ConfigError {
    ConfigError::AtPosition {
        position: value.position(),
        source: Box::new(source),
    }
}

fn with_context<R>(ctx: Option<&DecodeContext>, f: impl FnOnce(&DecodeContext) -> R) -> R {
    match ctx {
        Some(ctx) => f(ctx),
        None => f(&DecodeContext::background()),
    }
}

fn via_decoder(
    value: &Value,
    _ctx: Option<&DecodeContext>,
    target: &mut dyn DecodeTarget,
) -> Option<Result<(), ConfigError>> {
    let decoder = target.as_decoder()?;
    Some(decoder.decode(value).map_err(|e| at_position(value, e)))
}

fn via_context_decoder(
    value: &Value,
    ctx: Option<&DecodeContext>,
    target: &mut dyn DecodeTarget,
) -> Option<Result<(), ConfigError>> {
    let decoder = target.as_context_decoder()?;
    let result = with_context(ctx, |ctx| decoder.decode(ctx, value));
    Some(result.map_err(|e| at_position(value, e)))
}

fn via_config_decoder(
    value: &Value,
    ctx: Option<&DecodeContext>,
    target: &mut dyn DecodeTarget,
) -> Option<Result<(), ConfigError>> {
    let decoder = target.as_config_decoder()?;
    let result = with_context(ctx, |ctx| decoder.decode_config(ctx, value));
    Some(result.map_err(|e| at_position(value, e)))
}

fn via_scalar(
    value: &Value,
    _ctx: Option<&DecodeContext>,
    target: &mut dyn DecodeTarget,
) -> Option<Result<(), ConfigError>> {
    let slot = target.as_scalar()?;
    Some(fill(value, slot))
}

fn fill(value: &Value, slot: ScalarTarget<'_>) -> Result<(), ConfigError> {
    match slot {
        ScalarTarget::Bytes(out) => *out = value.bytes()?,
        ScalarTarget::String(out) => *out = value.string()?,
        ScalarTarget::Bool(out) => *out = value.bool()?,
        ScalarTarget::Duration(out) => {
            let nanos = value.i64()?;
            let nanos = u64::try_from(nanos).map_err(|_| value.out_of_range(nanos, "duration"))?;
            *out = Duration::from_nanos(nanos);
        }
        ScalarTarget::Isize(out) => *out = narrow(value, value.i64()?, "int")?,
        ScalarTarget::I8(out) => *out = narrow(value, value.i64()?, "int8")?,
        ScalarTarget::I16(out) => *out = narrow(value, value.i64()?, "int16")?,
        ScalarTarget::I32(out) => *out = narrow(value, value.i64()?, "int32")?,
        ScalarTarget::I64(out) => *out = value.i64()?,
        ScalarTarget::Usize(out) => *out = narrow(value, value.u64()?, "uint")?,
        ScalarTarget::U8(out) => *out = narrow(value, value.u64()?, "uint8")?,
        ScalarTarget::U16(out) => *out = narrow(value, value.u64()?, "uint16")?,
        ScalarTarget::U32(out) => *out = narrow(value, value.u64()?, "uint32")?,
        ScalarTarget::U64(out) => *out = value.u64()?,
    }
    Ok(())
}

fn narrow<W, T>(value: &Value, wide: W, target: &'static str) -> Result<T, ConfigError>
where
    W: Copy + fmt::Display,
    T: TryFrom<W>,
{
    T::try_from(wide).map_err(|_| value.out_of_range(wide, target))
}

fn structural(value: &Value, target: &mut dyn DecodeTarget) -> Result<(), ConfigError> {
    let payload = value.marshal()?;
    target
        .decode_interchange(&payload)
        .map_err(|source| ConfigError::StructuralDecode {
            source,
            position: value.position(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{ConfigLoader, Loader};
    use crate::value::Kind;
    use indexmap::IndexMap;
    use serde::Deserialize;
    use std::path::Path;

    fn load(yaml: &str) -> Value {
        let mut files = IndexMap::new();
        files.insert("decode.yaml".to_string(), yaml.as_bytes().to_vec());
        Loader::new().load(Path::new(""), &files).unwrap()
    }

    fn field(root: &Value, name: &str) -> Value {
        root.lookup([name]).0
    }

    #[derive(Default)]
    struct Upper(String);

    impl Decoder for Upper {
        fn decode(&mut self, value: &Value) -> Result<(), ConfigError> {
            self.0 = value.string()?.to_uppercase();
            Ok(())
        }
    }

    impl DecodeTarget for Upper {
        fn as_decoder(&mut self) -> Option<&mut dyn Decoder> {
            Some(self)
        }
    }

    /// Records whether it was handed a cancelled context.
    #[derive(Default)]
    struct SeesContext {
        cancelled: Option<bool>,
        via_config: bool,
    }

    impl ContextDecoder for SeesContext {
        fn decode(&mut self, ctx: &DecodeContext, _value: &Value) -> Result<(), ConfigError> {
            self.cancelled = Some(ctx.is_cancelled());
            Ok(())
        }
    }

    impl ConfigDecoder for SeesContext {
        fn decode_config(
            &mut self,
            ctx: &DecodeContext,
            _value: &Value,
        ) -> Result<(), ConfigError> {
            self.cancelled = Some(ctx.is_cancelled());
            self.via_config = true;
            Ok(())
        }
    }

    impl DecodeTarget for SeesContext {
        fn as_context_decoder(&mut self) -> Option<&mut dyn ContextDecoder> {
            Some(self)
        }

        fn as_config_decoder(&mut self) -> Option<&mut dyn ConfigDecoder> {
            Some(self)
        }
    }

    #[derive(Default)]
    struct ConfigOnly(bool);

    impl ConfigDecoder for ConfigOnly {
        fn decode_config(
            &mut self,
            _ctx: &DecodeContext,
            value: &Value,
        ) -> Result<(), ConfigError> {
            self.0 = value.bool()?;
            Ok(())
        }
    }

    impl DecodeTarget for ConfigOnly {
        fn as_config_decoder(&mut self) -> Option<&mut dyn ConfigDecoder> {
            Some(self)
        }
    }

    struct Failing;

    impl Decoder for Failing {
        fn decode(&mut self, _value: &Value) -> Result<(), ConfigError> {
            Err(ConfigError::custom("rejected"))
        }
    }

    impl DecodeTarget for Failing {
        fn as_decoder(&mut self) -> Option<&mut dyn Decoder> {
            Some(self)
        }
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Server {
        host: String,
        port: u16,
    }

    #[test]
    fn test_decoder_takes_priority() {
        let root = load("name: web\n");
        let mut target = Upper::default();
        field(&root, "name").decode(&mut target).unwrap();
        assert_eq!(target.0, "WEB");
    }

    #[test]
    fn test_decoder_failure_names_position() {
        let root = load("name: web\n");
        let err = field(&root, "name").decode(&mut Failing).unwrap_err();
        assert!(matches!(err, ConfigError::AtPosition { .. }));
        assert_eq!(err.to_string(), "rejected (position: decode.yaml:1:7)");
    }

    #[test]
    fn test_missing_context_becomes_background() {
        let root = load("x: 1\n");
        let mut target = SeesContext::default();
        field(&root, "x").decode(&mut target).unwrap();
        assert_eq!(target.cancelled, Some(false));
        assert!(!target.via_config);
    }

    #[test]
    fn test_context_is_passed_through() {
        let root = load("x: 1\n");
        let token = CancellationToken::new();
        token.cancel();
        let ctx = DecodeContext::new(token);

        let mut target = SeesContext::default();
        field(&root, "x").decode_with_context(Some(&ctx), &mut target).unwrap();
        assert_eq!(target.cancelled, Some(true));
    }

    #[test]
    fn test_config_decoder_step() {
        let root = load("enabled: true\n");
        let mut target = ConfigOnly::default();
        field(&root, "enabled").decode(&mut target).unwrap();
        assert!(target.0);
    }

    #[test]
    fn test_scalar_targets() {
        let root = load("s: text\nraw: !bytes AAE=\nb: true\nn: 42\nt: 1500\n");

        let mut s = String::new();
        field(&root, "s").decode(&mut s).unwrap();
        assert_eq!(s, "text");

        let mut raw: Vec<u8> = Vec::new();
        field(&root, "raw").decode(&mut raw).unwrap();
        assert_eq!(raw, vec![0, 1]);

        let mut b = false;
        field(&root, "b").decode(&mut b).unwrap();
        assert!(b);

        let mut small = 0u8;
        field(&root, "n").decode(&mut small).unwrap();
        assert_eq!(small, 42);

        let mut signed = 0i32;
        field(&root, "n").decode(&mut signed).unwrap();
        assert_eq!(signed, 42);

        let mut timeout = Duration::ZERO;
        field(&root, "t").decode(&mut timeout).unwrap();
        assert_eq!(timeout, Duration::from_nanos(1500));
    }

    #[test]
    fn test_scalar_errors_propagate_unchanged() {
        let root = load("s: text\n");
        let mut n = 0i64;
        let err = field(&root, "s").decode(&mut n).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::TypeMismatch {
                found: Kind::String,
                ..
            }
        ));
    }

    #[test]
    fn test_narrowing_is_checked() {
        let root = load("big: 300\nneg: -5\n");

        let mut small = 0u8;
        let err = field(&root, "big").decode(&mut small).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { target: "uint8", .. }));

        let mut tiny = 0i8;
        assert!(matches!(
            field(&root, "big").decode(&mut tiny),
            Err(ConfigError::OutOfRange { target: "int8", .. })
        ));

        let mut timeout = Duration::ZERO;
        assert!(matches!(
            field(&root, "neg").decode(&mut timeout),
            Err(ConfigError::OutOfRange { target: "duration", .. })
        ));
    }

    #[test]
    fn test_structural_fallback() {
        let root = load("server:\n  host: example.org\n  port: 8080\n");
        let mut server = Server::default();
        field(&root, "server").decode(&mut Structural(&mut server)).unwrap();
        assert_eq!(
            server,
            Server {
                host: "example.org".into(),
                port: 8080,
            }
        );
    }

    #[test]
    fn test_structural_failure() {
        let root = load("server:\n  host: example.org\n");
        let mut server = Server::default();
        let err = field(&root, "server")
            .decode(&mut Structural(&mut server))
            .unwrap_err();
        assert!(matches!(err, ConfigError::StructuralDecode { .. }));
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_structural_marshal_failure_propagates() {
        let root = load("server:\n  host: !string\n");
        let mut server = Server::default();
        let err = field(&root, "server")
            .decode(&mut Structural(&mut server))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Incomplete { .. }));
    }

    #[test]
    fn test_deadline() {
        let past = DecodeContext::background().with_deadline(Instant::now());
        assert!(past.is_expired());
        assert!(!DecodeContext::background().is_expired());
        assert!(DecodeContext::default().deadline().is_none());
    }
}
