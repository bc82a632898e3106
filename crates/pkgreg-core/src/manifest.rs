//! # Package Manifests
//!
//! Registries serve `Package.swift` as raw source text. The client hands that
//! text to a [`ManifestLoader`] and treats the resulting [`Manifest`] as
//! opaque output.
//!
//! [`SourceManifestLoader`] reads the declarative subset of the manifest
//! language that registries publish in practice: the tools-version header,
//! the package name, product and target declarations, and the supported
//! language versions. It does not evaluate arbitrary code; anything outside
//! that subset is ignored.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ManifestError;
use crate::identity::PackageIdentity;
use crate::Version;

/// Oldest tools version whose manifest format is understood.
const MINIMUM_TOOLS_MAJOR: u64 = 4;

const MULTILINE_QUOTE: &str = "\"\"\"";

static TOOLS_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^//\s*swift-tools-version\s*:\s*(\d+)(\.\d+){0,2}")
        .expect("tools-version regex is valid")
});

static PACKAGE_INIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bPackage\s*\(").expect("package regex is valid"));

static ELEMENT_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\.(\w+)\s*\(").expect("element regex is valid"));

static LANGUAGE_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\.v(\d+)(?:_(\d+))?$|^\.version\(\s*"([^"]+)"\s*\)$"#)
        .expect("language version regex is valid")
});

static LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("label regex is valid"));

/// Structured package description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Package display name.
    pub name: String,
    /// Declared tools version, e.g. `5.0`.
    pub tools_version: String,
    /// Products in declaration order.
    pub products: Vec<Product>,
    /// Targets in declaration order.
    pub targets: Vec<Target>,
    /// Supported language versions, if the manifest restricts them.
    pub swift_language_versions: Option<Vec<String>>,
}

/// A product vended by the package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub kind: ProductKind,
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    Library(LibraryKind),
    Executable,
    Plugin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryKind {
    Automatic,
    Static,
    Dynamic,
}

/// A target declared by the package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub kind: TargetKind,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Regular,
    Test,
    Executable,
    Plugin,
}

/// Turns manifest source text into a [`Manifest`].
pub trait ManifestLoader: Send + Sync {
    /// Parse `source`, the manifest published for `identity` at `version`.
    fn load(
        &self,
        source: &str,
        identity: &PackageIdentity,
        version: &Version,
    ) -> Result<Manifest, ManifestError>;
}

/// Loader for the declarative `Package.swift` subset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceManifestLoader;

impl ManifestLoader for SourceManifestLoader {
    fn load(
        &self,
        source: &str,
        identity: &PackageIdentity,
        version: &Version,
    ) -> Result<Manifest, ManifestError> {
        let tools_version = parse_tools_version(source)?;
        let code = strip_comments(source)?;

        let package = PACKAGE_INIT
            .find(&code)
            .ok_or(ManifestError::MissingPackageDeclaration)?;
        let args = enclosed(&code, package.end() - 1)?;
        let arguments = labeled_arguments(args);

        let name = argument(&arguments, "name")
            .and_then(string_literal)
            .ok_or(ManifestError::MissingName)?;

        let products = array_argument(&arguments, "products")?
            .unwrap_or_default()
            .into_iter()
            .filter_map(|element| parse_product(element).transpose())
            .collect::<Result<Vec<_>, _>>()?;

        let targets = array_argument(&arguments, "targets")?
            .unwrap_or_default()
            .into_iter()
            .filter_map(|element| parse_target(element).transpose())
            .collect::<Result<Vec<_>, _>>()?;

        let swift_language_versions = array_argument(&arguments, "swiftLanguageVersions")?
            .map(|items| items.into_iter().filter_map(language_version).collect::<Vec<_>>());

        tracing::debug!(
            %identity,
            %version,
            products = products.len(),
            targets = targets.len(),
            "loaded manifest"
        );

        Ok(Manifest {
            name,
            tools_version,
            products,
            targets,
            swift_language_versions,
        })
    }
}

fn parse_tools_version(source: &str) -> Result<String, ManifestError> {
    let first_line = source.lines().next().unwrap_or_default().trim();
    let captures = TOOLS_VERSION
        .captures(first_line)
        .ok_or(ManifestError::MissingToolsVersion)?;

    let version = captures[0]
        .rsplit(':')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    let major: u64 = captures[1]
        .parse()
        .map_err(|_| ManifestError::UnsupportedToolsVersion(version.clone()))?;
    if major < MINIMUM_TOOLS_MAJOR {
        return Err(ManifestError::UnsupportedToolsVersion(version));
    }
    Ok(version)
}

fn unterminated_string() -> ManifestError {
    ManifestError::Malformed("unterminated string literal".into())
}

/// Byte offset just past the string literal opening at `start`.
/// Handles `"""` multi-line literals and backslash escapes.
fn literal_end(text: &str, start: usize) -> Result<usize, ManifestError> {
    let rest = &text[start..];
    let delimiter = if rest.starts_with(MULTILINE_QUOTE) { MULTILINE_QUOTE } else { "\"" };
    let body = &rest[delimiter.len()..];

    let mut chars = body.char_indices();
    while let Some((index, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '\n' if delimiter.len() == 1 => return Err(unterminated_string()),
            '"' if body[index..].starts_with(delimiter) => {
                return Ok(start + delimiter.len() + index + delimiter.len());
            }
            _ => {}
        }
    }
    Err(unterminated_string())
}

/// Byte offset just past the (nested) block comment opening at the start of `text`.
fn block_comment_end(text: &str) -> Result<usize, ManifestError> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index..].starts_with(b"/*") {
            depth += 1;
            index += 2;
        } else if bytes[index..].starts_with(b"*/") {
            depth -= 1;
            index += 2;
            if depth == 0 {
                return Ok(index);
            }
        } else {
            index += 1;
        }
    }
    Err(ManifestError::Malformed("unterminated block comment".into()))
}

/// Remove `//` and (nested) `/* */` comments, leaving string literals intact.
fn strip_comments(source: &str) -> Result<String, ManifestError> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(c) = rest.chars().next() {
        let consumed = if c == '"' {
            let end = literal_end(rest, 0)?;
            out.push_str(&rest[..end]);
            end
        } else if rest.starts_with("//") {
            match rest.find('\n') {
                Some(newline) => {
                    out.push('\n');
                    newline + 1
                }
                None => rest.len(),
            }
        } else if rest.starts_with("/*") {
            out.push(' ');
            block_comment_end(rest)?
        } else {
            out.push(c);
            c.len_utf8()
        };
        rest = &rest[consumed..];
    }
    Ok(out)
}

/// Contents between the bracket at byte offset `open` and its match.
fn enclosed(text: &str, open: usize) -> Result<&str, ManifestError> {
    let mut depth = 0usize;
    let mut index = open;

    while let Some(c) = text[index..].chars().next() {
        match c {
            '"' => {
                index = literal_end(text, index)?;
                continue;
            }
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(&text[open + 1..index]);
                }
            }
            _ => {}
        }
        index += c.len_utf8();
    }

    Err(ManifestError::Malformed("unbalanced brackets".into()))
}

/// Split on commas that are outside brackets and string literals.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut index = 0;

    while let Some(c) = text[index..].chars().next() {
        match c {
            '"' => {
                // Literals were validated when comments were stripped.
                index = literal_end(text, index).unwrap_or(text.len());
                continue;
            }
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(text[start..index].trim());
                start = index + 1;
            }
            _ => {}
        }
        index += c.len_utf8();
    }
    parts.push(text[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Argument list as `(label, value)` pairs; unlabeled arguments get `None`.
fn labeled_arguments(args: &str) -> Vec<(Option<&str>, &str)> {
    split_top_level(args)
        .into_iter()
        .map(|arg| match arg.split_once(':') {
            Some((label, value)) if LABEL.is_match(label.trim()) => {
                (Some(label.trim()), value.trim())
            }
            _ => (None, arg),
        })
        .collect()
}

fn argument<'a>(arguments: &[(Option<&str>, &'a str)], label: &str) -> Option<&'a str> {
    arguments
        .iter()
        .find(|(l, _)| *l == Some(label))
        .map(|(_, value)| *value)
}

/// Elements of an array literal value; `None` for any other expression,
/// such as a variable defined elsewhere in the manifest.
fn elements(value: &str) -> Result<Option<Vec<&str>>, ManifestError> {
    let value = value.trim();
    if !value.starts_with('[') {
        return Ok(None);
    }
    Ok(Some(split_top_level(enclosed(value, 0)?)))
}

fn array_argument<'a>(
    arguments: &[(Option<&str>, &'a str)],
    label: &str,
) -> Result<Option<Vec<&'a str>>, ManifestError> {
    let Some(value) = argument(arguments, label) else {
        return Ok(None);
    };
    let items = elements(value)?;
    if items.is_none() {
        tracing::debug!(label, value, "skipping argument that is not an array literal");
    }
    Ok(items)
}

fn string_literal(value: &str) -> Option<String> {
    let value = value.trim();
    if let Some(inner) = value
        .strip_prefix(MULTILINE_QUOTE)
        .and_then(|v| v.strip_suffix(MULTILINE_QUOTE))
    {
        return Some(inner.trim_matches('\n').to_string());
    }
    let inner = value.strip_prefix('"')?.strip_suffix('"')?;
    Some(inner.replace("\\\"", "\""))
}

/// Split `.kind(args…)` into its kind and labeled arguments.
fn element_call(element: &str) -> Result<Option<(&str, Vec<(Option<&str>, &str)>)>, ManifestError> {
    let Some(captures) = ELEMENT_CALL.captures(element) else {
        return Ok(None);
    };
    let kind = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
    let open = captures.get(0).map(|m| m.end() - 1).unwrap_or_default();
    Ok(Some((kind, labeled_arguments(enclosed(element, open)?))))
}

fn string_list(value: Option<&str>) -> Result<Vec<String>, ManifestError> {
    let Some(list) = value else {
        return Ok(Vec::new());
    };
    Ok(elements(list)?
        .unwrap_or_default()
        .into_iter()
        .filter_map(dependency_name)
        .collect())
}

/// `"Name"`, `.target(name: "Name")`, `.product(name: "Name", package: …)`.
fn dependency_name(element: &str) -> Option<String> {
    if let Some(name) = string_literal(element) {
        return Some(name);
    }
    let (_, arguments) = element_call(element).ok()??;
    argument(&arguments, "name").and_then(string_literal)
}

fn parse_product(element: &str) -> Result<Option<Product>, ManifestError> {
    let Some((kind, arguments)) = element_call(element)? else {
        return Ok(None);
    };
    let kind = match kind {
        "library" => {
            let library = match argument(&arguments, "type").map(str::trim) {
                Some(".static") => LibraryKind::Static,
                Some(".dynamic") => LibraryKind::Dynamic,
                _ => LibraryKind::Automatic,
            };
            ProductKind::Library(library)
        }
        "executable" => ProductKind::Executable,
        "plugin" => ProductKind::Plugin,
        _ => return Ok(None),
    };
    let Some(name) = argument(&arguments, "name").and_then(string_literal) else {
        return Err(ManifestError::Malformed("product without a name".into()));
    };

    Ok(Some(Product {
        name,
        kind,
        targets: string_list(argument(&arguments, "targets"))?,
    }))
}

fn parse_target(element: &str) -> Result<Option<Target>, ManifestError> {
    let Some((kind, arguments)) = element_call(element)? else {
        return Ok(None);
    };
    let kind = match kind {
        "target" => TargetKind::Regular,
        "testTarget" => TargetKind::Test,
        "executableTarget" => TargetKind::Executable,
        "plugin" => TargetKind::Plugin,
        _ => return Ok(None),
    };
    let Some(name) = argument(&arguments, "name").and_then(string_literal) else {
        return Err(ManifestError::Malformed("target without a name".into()));
    };

    Ok(Some(Target {
        name,
        kind,
        dependencies: string_list(argument(&arguments, "dependencies"))?,
    }))
}

/// `.v4` → `4`, `.v4_2` → `4.2`, `.version("6")` → `6`.
fn language_version(element: &str) -> Option<String> {
    let captures = LANGUAGE_VERSION.captures(element.trim())?;
    if let Some(explicit) = captures.get(3) {
        return Some(explicit.as_str().to_string());
    }
    let major = captures.get(1)?.as_str();
    Some(match captures.get(2) {
        Some(minor) => format!("{major}.{}", minor.as_str()),
        None => major.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINKED_LIST: &str = r#"// swift-tools-version:5.0
import PackageDescription

let package = Package(
    name: "LinkedList",
    products: [
        .library(name: "LinkedList", targets: ["LinkedList"])
    ],
    targets: [
        .target(name: "LinkedList"),
        .testTarget(name: "LinkedListTests", dependencies: ["LinkedList"]),
    ],
    swiftLanguageVersions: [.v4, .v5]
)
"#;

    fn load(source: &str) -> Result<Manifest, ManifestError> {
        SourceManifestLoader.load(
            source,
            &PackageIdentity::plain("mona.LinkedList"),
            &Version::new(1, 1, 1),
        )
    }

    #[test]
    fn loads_linked_list_manifest() {
        let manifest = load(LINKED_LIST).unwrap();
        assert_eq!(manifest.name, "LinkedList");
        assert_eq!(manifest.tools_version, "5.0");

        assert_eq!(manifest.products.len(), 1);
        assert_eq!(manifest.products[0].name, "LinkedList");
        assert_eq!(
            manifest.products[0].kind,
            ProductKind::Library(LibraryKind::Automatic)
        );
        assert_eq!(manifest.products[0].targets, vec!["LinkedList"]);

        assert_eq!(manifest.targets.len(), 2);
        assert_eq!(manifest.targets[0].name, "LinkedList");
        assert_eq!(manifest.targets[0].kind, TargetKind::Regular);
        assert_eq!(manifest.targets[1].name, "LinkedListTests");
        assert_eq!(manifest.targets[1].kind, TargetKind::Test);
        assert_eq!(manifest.targets[1].dependencies, vec!["LinkedList"]);

        assert_eq!(
            manifest.swift_language_versions,
            Some(vec!["4".to_string(), "5".to_string()])
        );
    }

    #[test]
    fn product_targets_do_not_leak_into_package_targets() {
        let source = r#"// swift-tools-version:5.5
import PackageDescription
let package = Package(
    name: "Tools",
    products: [.executable(name: "tool", targets: ["Tool"]), .library(name: "Kit", type: .dynamic, targets: ["Kit"])],
    targets: [.executableTarget(name: "Tool", dependencies: [.target(name: "Kit"), .product(name: "ArgumentParser", package: "swift-argument-parser")]), .target(name: "Kit")]
)
"#;
        let manifest = load(source).unwrap();
        assert_eq!(manifest.products[0].kind, ProductKind::Executable);
        assert_eq!(
            manifest.products[1].kind,
            ProductKind::Library(LibraryKind::Dynamic)
        );
        assert_eq!(manifest.targets.len(), 2);
        assert_eq!(manifest.targets[0].kind, TargetKind::Executable);
        assert_eq!(
            manifest.targets[0].dependencies,
            vec!["Kit", "ArgumentParser"]
        );
        assert_eq!(manifest.swift_language_versions, None);
    }

    #[test]
    fn comments_and_urls_are_handled() {
        let source = r#"// swift-tools-version:5.3
import PackageDescription
/* products: [.library(name: "Ghost", targets: [])] */
let package = Package(
    name: "Net", // the name
    dependencies: [.package(url: "https://example.com/mona/LinkedList", from: "1.0.0")],
    targets: [.target(name: "Net")],
    swiftLanguageVersions: [.v4_2, .version("5")]
)
"#;
        let manifest = load(source).unwrap();
        assert_eq!(manifest.name, "Net");
        assert!(manifest.products.is_empty());
        assert_eq!(
            manifest.swift_language_versions,
            Some(vec!["4.2".to_string(), "5".to_string()])
        );
    }

    #[test]
    fn non_literal_arguments_are_skipped() {
        let source = r#"// swift-tools-version:5.7
import PackageDescription

let targets: [Target] = [.target(name: "Core")]

let package = Package(
    name: "Modular",
    products: [.library(name: "Modular", targets: sharedTargets)],
    targets: targets,
    swiftLanguageVersions: supportedVersions
)
"#;
        let manifest = load(source).unwrap();
        assert_eq!(manifest.name, "Modular");
        assert_eq!(manifest.products.len(), 1);
        assert!(manifest.products[0].targets.is_empty());
        assert!(manifest.targets.is_empty());
        assert_eq!(manifest.swift_language_versions, None);
    }

    #[test]
    fn multiline_string_literals_are_skipped_over() {
        let source = r#"// swift-tools-version:5.9
import PackageDescription

let notice = """
    Linked "lists" for everyone.
    // not a comment, ] ) , still text
    """

let package = Package(
    name: "LinkedList",
    targets: [
        .target(name: "LinkedList", exclude: ["""
            README.md
            """]),
        .testTarget(name: "LinkedListTests", dependencies: ["LinkedList"]),
    ]
)
"#;
        let manifest = load(source).unwrap();
        assert_eq!(manifest.name, "LinkedList");
        assert_eq!(manifest.targets.len(), 2);
        assert_eq!(manifest.targets[1].dependencies, vec!["LinkedList"]);
    }

    #[test]
    fn unterminated_multiline_string_is_rejected() {
        let err = load("// swift-tools-version:5.9\nlet package = Package(name: \"\"\"X)").unwrap_err();
        assert_eq!(err, ManifestError::Malformed("unterminated string literal".into()));
    }

    #[test]
    fn missing_tools_version_is_rejected() {
        let err = load("import PackageDescription\nlet package = Package(name: \"X\")").unwrap_err();
        assert_eq!(err, ManifestError::MissingToolsVersion);
    }

    #[test]
    fn old_tools_version_is_rejected() {
        let err = load("// swift-tools-version:3.1\nlet package = Package(name: \"X\")").unwrap_err();
        assert_eq!(err, ManifestError::UnsupportedToolsVersion("3.1".into()));
    }

    #[test]
    fn missing_package_is_rejected() {
        let err = load("// swift-tools-version:5.0\nimport PackageDescription\n").unwrap_err();
        assert_eq!(err, ManifestError::MissingPackageDeclaration);
    }

    #[test]
    fn missing_name_is_rejected() {
        let err = load("// swift-tools-version:5.0\nlet package = Package(targets: [])").unwrap_err();
        assert_eq!(err, ManifestError::MissingName);
    }

    #[test]
    fn unbalanced_brackets_are_rejected() {
        let err = load("// swift-tools-version:5.0\nlet package = Package(name: \"X\", targets: [").unwrap_err();
        assert!(matches!(err, ManifestError::Malformed(_)));
    }

    #[test]
    fn manifest_serializes_to_json() {
        let manifest = load(LINKED_LIST).unwrap();
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["name"], "LinkedList");
        assert_eq!(json["targets"][1]["kind"], "test");
    }
}
