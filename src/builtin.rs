//! Built-in descriptors for the runtime's platform scaffolding.
//!
//! The compiled runtime ships two platform-neutral pieces that every build
//! flavor specializes:
//!
//! - `runtime/random.js` tests for a strong random source at load time and
//!   falls back to a pseudo-random filler. [`random_source`] replaces the
//!   detection with a direct binding per target.
//! - `browser/bytes.js` assumes text codecs and base64 helpers exist as
//!   globals. [`text_codec_shim`] prepends imports of vendored versions for
//!   the vendored browser build.

use crate::target::TargetEnvironment;
use crate::transform::{Anchor, ModuleMatcher, TransformDescriptor};

pub const RANDOM_SOURCE: &str = "random-source";
pub const TEXT_CODEC_SHIM: &str = "text-codec-shim";

pub const RANDOM_SOURCE_MODULE: &str = "runtime/random.js";
pub const TEXT_CODEC_MODULE: &str = "browser/bytes.js";

/// Fallback chain emitted by the compiler for the random source.
pub const RANDOM_SOURCE_ANCHOR: &str = "\
let randomBytesSource;
try {
  randomBytesSource = globalThis.crypto.getRandomValues.bind(globalThis.crypto);
} catch {
  randomBytesSource = pseudoRandomFill;
}";

pub const RANDOM_SOURCE_SERVER: &str = "\
import { webcrypto as nodeWebCrypto } from \"node:crypto\";
const randomBytesSource = nodeWebCrypto.getRandomValues.bind(nodeWebCrypto);";

pub const RANDOM_SOURCE_BROWSER: &str = "const randomBytesSource = pseudoRandomFill;";

pub const TEXT_CODEC_PRELUDE: &str = "\
import { TextEncoder, TextDecoder } from \"../vendor/text-encoding.js\";
import { fromByteArray as base64Encode, toByteArray as base64Decode } from \"../vendor/base64.js\";
";

/// Swap the random-source detection for a direct binding.
pub fn random_source() -> TransformDescriptor {
    TransformDescriptor::new(
        RANDOM_SOURCE,
        ModuleMatcher::Suffix(RANDOM_SOURCE_MODULE.to_string()),
        Anchor::Literal(RANDOM_SOURCE_ANCHOR.to_string()),
    )
    .with_description("bind the random byte source directly instead of probing at load time")
    .with_replacement(TargetEnvironment::Server, RANDOM_SOURCE_SERVER)
    .with_replacement(TargetEnvironment::Browser, RANDOM_SOURCE_BROWSER)
    .with_replacement(TargetEnvironment::BrowserVendored, RANDOM_SOURCE_BROWSER)
}

/// Prepend imports of the vendored text codec and base64 helpers.
pub fn text_codec_shim() -> TransformDescriptor {
    TransformDescriptor::new(
        TEXT_CODEC_SHIM,
        ModuleMatcher::Suffix(TEXT_CODEC_MODULE.to_string()),
        Anchor::Prepend,
    )
    .with_description("import vendored TextEncoder/TextDecoder and base64 helpers")
    .with_replacement(TargetEnvironment::BrowserVendored, TEXT_CODEC_PRELUDE)
}

/// Descriptors registered for a build of `target`, in execution order.
///
/// The text codec shim is only part of the vendored browser build; other
/// flavors rely on the platform globals.
pub fn registry(target: TargetEnvironment) -> Vec<TransformDescriptor> {
    let mut descriptors = vec![random_source()];
    if target == TargetEnvironment::BrowserVendored {
        descriptors.push(text_codec_shim());
    }
    descriptors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{ModuleUnit, TransformError};

    fn random_module() -> String {
        format!(
            "import {{ pseudoRandomFill }} from \"./prng.js\";\n{RANDOM_SOURCE_ANCHOR}\nexport function randomBytes(n) {{\n  const buf = new Uint8Array(n);\n  randomBytesSource(buf);\n  return buf;\n}}\n"
        )
    }

    #[test]
    fn test_random_source_covers_every_target() {
        let descriptor = random_source();
        for target in TargetEnvironment::ALL {
            assert!(descriptor.replacement_for(target).is_some(), "{target}");
        }
    }

    #[test]
    fn test_random_source_server() {
        let text = random_module();
        let unit = ModuleUnit::new("dist/runtime/random.js", &text);
        let output = random_source()
            .try_apply(TargetEnvironment::Server, &unit)
            .unwrap()
            .unwrap();
        assert!(output.text.contains("nodeWebCrypto.getRandomValues"));
        assert!(!output.text.contains(RANDOM_SOURCE_ANCHOR));
        assert!(!output.text.contains("try {"));
    }

    #[test]
    fn test_random_source_browser() {
        let text = random_module();
        let unit = ModuleUnit::new("dist/runtime/random.js", &text);
        let output = random_source()
            .try_apply(TargetEnvironment::Browser, &unit)
            .unwrap()
            .unwrap();
        assert!(output.text.contains(RANDOM_SOURCE_BROWSER));
        assert!(!output.text.contains("globalThis.crypto"));
        assert!(!output.text.contains("node:crypto"));
    }

    #[test]
    fn test_text_codec_shim_only_covers_vendored() {
        let unit = ModuleUnit::new("dist/browser/bytes.js", "export const x = 1;\n");
        let err = text_codec_shim()
            .try_apply(TargetEnvironment::Browser, &unit)
            .unwrap_err();
        assert!(matches!(err, TransformError::UnsupportedTarget { .. }));
    }

    #[test]
    fn test_text_codec_prelude_is_two_lines() {
        assert_eq!(TEXT_CODEC_PRELUDE.lines().count(), 2);
        assert!(TEXT_CODEC_PRELUDE.ends_with('\n'));
    }

    #[test]
    fn test_registry_per_target() {
        let names = |target| {
            registry(target)
                .into_iter()
                .map(|descriptor| descriptor.name)
                .collect::<Vec<_>>()
        };
        assert_eq!(names(TargetEnvironment::Server), vec![RANDOM_SOURCE]);
        assert_eq!(names(TargetEnvironment::Browser), vec![RANDOM_SOURCE]);
        assert_eq!(
            names(TargetEnvironment::BrowserVendored),
            vec![RANDOM_SOURCE, TEXT_CODEC_SHIM]
        );
    }
}
