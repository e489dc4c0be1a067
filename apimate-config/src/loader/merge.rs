/// Recursively merge two TOML values.
///
/// Tables merge key by key; any other overlay value replaces the base. Arrays
/// are replaced wholesale, so an overriding `[[entries]]` list swaps the whole
/// declarative list rather than appending to it.
pub fn merge_toml_values(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(key) {
                    Some(base_value) => merge_toml_values(base_value, value),
                    None => {
                        base_table.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}
