//! Conversions between dotted names (`com.example.Foo`), internal names
//! (`com/example/Foo`) and unit entry paths (`com/example/Foo.class`).

const UNIT_SUFFIX: &str = ".class";

/// Convert a dotted or already-internal name to internal form.
pub fn internal_name(name: &str) -> String {
    name.trim().replace('.', "/")
}

/// Convert an internal name to dotted form for display and pattern matching.
pub fn dotted_name(name: &str) -> String {
    name.replace('/', ".")
}

/// Entry path under which a unit with the given internal name is stored.
pub fn unit_entry_name(internal: &str) -> String {
    format!("{internal}{UNIT_SUFFIX}")
}

/// Normalize a relative path to `/` separators regardless of host convention.
pub fn normalize_entry_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}
