use log::warn;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::extension::descriptor::{MenuAnchor, MenuCustomization};

/// An entry of the top menu bar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub uuid: String,
    pub label: String,
    pub url: String,
    pub permissions: Vec<String>,
    pub children: Vec<MenuItem>,
}

impl MenuItem {
    pub fn new(uuid: impl Into<String>, label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            label: label.into(),
            url: url.into(),
            permissions: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_child(mut self, child: MenuItem) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Default)]
struct MenuState {
    defaults: Vec<MenuItem>,
    main: Vec<MenuItem>,
    tools: Vec<MenuItem>,
}

/// The application menu: an ordered tree of main items plus a flat list
/// of tool items (where started plugins show up).
#[derive(Debug, Default)]
pub struct TopMenuBar {
    state: Mutex<MenuState>,
}

fn remove_from(items: &mut Vec<MenuItem>, uuid: &str) -> bool {
    if let Some(pos) = items.iter().position(|i| i.uuid == uuid) {
        items.remove(pos);
        return true;
    }
    items.iter_mut().any(|i| remove_from(&mut i.children, uuid))
}

/// Locate the list holding `uuid` and its index in it
fn locate<'a>(items: &'a mut Vec<MenuItem>, uuid: &str) -> Option<(&'a mut Vec<MenuItem>, usize)> {
    if let Some(pos) = items.iter().position(|i| i.uuid == uuid) {
        return Some((items, pos));
    }
    for item in items.iter_mut() {
        if let Some(found) = locate(&mut item.children, uuid) {
            return Some(found);
        }
    }
    None
}

fn find_mut<'a>(items: &'a mut [MenuItem], uuid: &str) -> Option<&'a mut MenuItem> {
    for item in items.iter_mut() {
        if item.uuid == uuid {
            return Some(item);
        }
        if let Some(found) = find_mut(&mut item.children, uuid) {
            return Some(found);
        }
    }
    None
}

impl TopMenuBar {
    pub fn new(defaults: Vec<MenuItem>) -> Self {
        Self {
            state: Mutex::new(MenuState {
                main: defaults.clone(),
                defaults,
                tools: Vec::new(),
            }),
        }
    }

    /// Restore the main items to their initial layout
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.main = state.defaults.clone();
    }

    pub async fn main_items(&self) -> Vec<MenuItem> {
        self.state.lock().await.main.clone()
    }

    pub async fn tool_items(&self) -> Vec<MenuItem> {
        self.state.lock().await.tools.clone()
    }

    pub async fn remove(&self, uuid: &str) -> bool {
        remove_from(&mut self.state.lock().await.main, uuid)
    }

    pub async fn add_top(&self, item: MenuItem) {
        self.state.lock().await.main.push(item);
    }

    pub async fn add_after(&self, anchor: &str, item: MenuItem) -> bool {
        let mut state = self.state.lock().await;
        match locate(&mut state.main, anchor) {
            Some((list, pos)) => {
                list.insert(pos + 1, item);
                true
            }
            None => false,
        }
    }

    pub async fn add_before(&self, anchor: &str, item: MenuItem) -> bool {
        let mut state = self.state.lock().await;
        match locate(&mut state.main, anchor) {
            Some((list, pos)) => {
                list.insert(pos, item);
                true
            }
            None => false,
        }
    }

    pub async fn add_into(&self, parent: &str, item: MenuItem) -> bool {
        let mut state = self.state.lock().await;
        match find_mut(&mut state.main, parent) {
            Some(parent) => {
                parent.children.push(item);
                true
            }
            None => false,
        }
    }

    /// Add or replace a tool item
    pub async fn add_tool_item(&self, item: MenuItem) {
        let mut state = self.state.lock().await;
        state.tools.retain(|i| i.uuid != item.uuid);
        state.tools.push(item);
    }

    pub async fn remove_tool_item(&self, uuid: &str) -> bool {
        let mut state = self.state.lock().await;
        let before = state.tools.len();
        state.tools.retain(|i| i.uuid != uuid);
        state.tools.len() != before
    }

    /// Apply the removals, then the additions, of a customization block.
    pub async fn apply_customization(&self, customization: &MenuCustomization) {
        for uuid in &customization.remove {
            if !self.remove(uuid).await {
                warn!("Menu item '{}' to remove does not exist", uuid);
            }
        }
        for addition in &customization.add {
            let item = MenuItem::new(&addition.uuid, &addition.label, &addition.url)
                .with_permissions(addition.permissions.clone());
            let added = match &addition.anchor {
                MenuAnchor::After(anchor) => self.add_after(anchor, item).await,
                MenuAnchor::Before(anchor) => self.add_before(anchor, item).await,
                MenuAnchor::Into(parent) => self.add_into(parent, item).await,
                MenuAnchor::TopLevel => {
                    self.add_top(item).await;
                    true
                }
            };
            if !added {
                warn!(
                    "Unable to add the menu item '{}': anchor {:?} not found",
                    addition.uuid, addition.anchor
                );
            }
        }
    }
}
