/// How the expected input channel count of the classifier was decided.
///
/// Resolved once when the model is loaded:
/// 1. a declared input shape whose last dimension is 1 or 3 wins;
/// 2. otherwise (no shape, dynamic or unsupported last dimension) the
///    classifier is fed single-channel grayscale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelPolicy {
    Declared(u8),
    DefaultGrayscale,
}

impl ChannelPolicy {
    pub fn resolve(declared_shape: Option<&[i64]>) -> Self {
        let Some(shape) = declared_shape else {
            log::warn!("Classifier declares no input shape; feeding grayscale (1 channel)");
            return Self::DefaultGrayscale;
        };
        match shape.last() {
            Some(&c) if c == 1 || c == 3 => {
                log::info!("Classifier input shape {shape:?}; feeding {c} channel(s)");
                Self::Declared(c as u8)
            }
            _ => {
                log::warn!(
                    "Classifier input shape {shape:?} has no usable channel dimension; \
                     feeding grayscale (1 channel)"
                );
                Self::DefaultGrayscale
            }
        }
    }

    pub fn channels(self) -> u8 {
        match self {
            Self::Declared(c) => c,
            Self::DefaultGrayscale => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::rgb(&[-1, 48, 48, 3], ChannelPolicy::Declared(3))]
    #[case::gray(&[1, 48, 48, 1], ChannelPolicy::Declared(1))]
    #[case::dynamic_channels(&[-1, 48, 48, -1], ChannelPolicy::DefaultGrayscale)]
    #[case::nchw(&[1, 1, 48, 48], ChannelPolicy::DefaultGrayscale)]
    #[case::empty(&[], ChannelPolicy::DefaultGrayscale)]
    fn test_resolve_declared_shapes(#[case] shape: &[i64], #[case] expected: ChannelPolicy) {
        assert_eq!(ChannelPolicy::resolve(Some(shape)), expected);
    }

    #[test]
    fn test_resolve_without_shape_defaults_to_grayscale() {
        let policy = ChannelPolicy::resolve(None);
        assert_eq!(policy, ChannelPolicy::DefaultGrayscale);
        assert_eq!(policy.channels(), 1);
    }

    #[test]
    fn test_declared_channels() {
        assert_eq!(ChannelPolicy::Declared(3).channels(), 3);
    }
}
