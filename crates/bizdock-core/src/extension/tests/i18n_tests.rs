use crate::extension::i18n::MessageCatalog;

#[tokio::test]
async fn test_add_and_remove_messages() {
    let catalog = MessageCatalog::default();
    let added = catalog.add("en", "title=Title\nbody = Body text\n").await.unwrap();
    assert_eq!(added.keys, vec!["title", "body"]);
    assert_eq!(catalog.get("en", "body").await.as_deref(), Some("Body text"));

    catalog.remove(&added).await;
    assert_eq!(catalog.get("en", "title").await, None);
    assert_eq!(catalog.len("en").await, 0);
}

#[tokio::test]
async fn test_unsupported_language_is_ignored() {
    let catalog = MessageCatalog::new(vec!["en".to_string()]);
    assert!(catalog.add("fr", "title=Titre").await.is_none());
    assert_eq!(catalog.len("fr").await, 0);
}

#[tokio::test]
async fn test_removal_only_touches_added_keys() {
    let catalog = MessageCatalog::default();
    catalog.add("en", "core.title=Core").await.unwrap();
    let added = catalog.add("en", "ext.title=Extension").await.unwrap();
    catalog.remove(&added).await;
    assert_eq!(catalog.get("en", "core.title").await.as_deref(), Some("Core"));
}
