use bizdock_core::extension::Extension;
use bizdock_core::plugin_system::PluginInfo;

/// One line per loaded extension, followed by its plugin identifiers.
pub fn render_extensions(extensions: &[std::sync::Arc<Extension>]) -> String {
    if extensions.is_empty() {
        return "No extension loaded.\n".to_string();
    }
    let mut out = String::new();
    for extension in extensions {
        let descriptor = extension.descriptor();
        out.push_str(&format!(
            "{} ({}, {} controller(s))\n",
            extension.name(),
            extension.path().display(),
            extension.controllers().len()
        ));
        for plugin in &descriptor.plugins {
            out.push_str(&format!("  - plugin {} v{}: {}\n", plugin.identifier, plugin.version, plugin.name));
        }
    }
    out
}

/// Registered plugin configurations, sorted by id
pub fn render_plugins(plugins: &[PluginInfo]) -> String {
    if plugins.is_empty() {
        return "No plugin registered.\n".to_string();
    }
    let mut sorted: Vec<&PluginInfo> = plugins.iter().collect();
    sorted.sort_by_key(|p| p.id);
    let mut out = String::new();
    for plugin in sorted {
        out.push_str(&format!(
            "{:>4}  {:<24} {:<24} {}\n",
            plugin.id, plugin.name, plugin.identifier, plugin.status
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizdock_core::PluginStatus;

    #[test]
    fn test_render_plugins_sorted_by_id() {
        let plugins = vec![
            PluginInfo {
                id: 2,
                name: "second".to_string(),
                identifier: "acme-connector".to_string(),
                status: PluginStatus::Stopped,
            },
            PluginInfo {
                id: 1,
                name: "first".to_string(),
                identifier: "acme-connector".to_string(),
                status: PluginStatus::StartFailed,
            },
        ];
        let rendered = render_plugins(&plugins);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("first") && lines[0].ends_with("START_FAILED"));
        assert!(lines[1].contains("second") && lines[1].ends_with("STOPPED"));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_plugins(&[]), "No plugin registered.\n");
        assert_eq!(render_extensions(&[]), "No extension loaded.\n");
    }
}
