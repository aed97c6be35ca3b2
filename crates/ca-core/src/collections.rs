//! Collection names and the per-resource rules the admin routes apply.

pub const USERS: &str = "users";
pub const POSTS: &str = "posts";
pub const NEWS: &str = "news";
pub const BUSINESSES: &str = "businesses";
pub const RESOURCES: &str = "resources";
pub const RESOURCE_CONTENT: &str = "resourceContent";
pub const DOCUMENTS: &str = "documents";
pub const COMMUNITIES: &str = "communities";

pub const FIELD_COMMUNITY: &str = "community";
pub const FIELD_FAVORITE_COMMUNITIES: &str = "favoriteCommunities";
pub const FIELD_NAME: &str = "name";
pub const FIELD_FORMATTED_ID: &str = "formattedId";
pub const FIELD_ID: &str = "id";
pub const FIELD_CREATED_AT: &str = "createdAt";
pub const FIELD_UPDATED_AT: &str = "updatedAt";

/// Collections rewritten by an association sweep, in sweep order.
pub const ASSOCIATION_COLLECTIONS: [&str; 7] = [
    USERS,
    POSTS,
    NEWS,
    BUSINESSES,
    RESOURCES,
    RESOURCE_CONTENT,
    DOCUMENTS,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Users,
    Posts,
    News,
    Businesses,
    Resources,
    ResourceContent,
    Documents,
    Communities,
}

impl RecordKind {
    /// Kinds served by the generic JSON record routes.
    pub const GENERIC: [RecordKind; 6] = [
        RecordKind::Users,
        RecordKind::Posts,
        RecordKind::News,
        RecordKind::Businesses,
        RecordKind::Resources,
        RecordKind::ResourceContent,
    ];

    pub fn collection(self) -> &'static str {
        match self {
            RecordKind::Users => USERS,
            RecordKind::Posts => POSTS,
            RecordKind::News => NEWS,
            RecordKind::Businesses => BUSINESSES,
            RecordKind::Resources => RESOURCES,
            RecordKind::ResourceContent => RESOURCE_CONTENT,
            RecordKind::Documents => DOCUMENTS,
            RecordKind::Communities => COMMUNITIES,
        }
    }

    pub fn route_segment(self) -> &'static str {
        match self {
            RecordKind::ResourceContent => "resource-content",
            other => other.collection(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RecordKind::Users => "user",
            RecordKind::Posts => "post",
            RecordKind::News => "news item",
            RecordKind::Businesses => "business",
            RecordKind::Resources => "resource",
            RecordKind::ResourceContent => "resource content",
            RecordKind::Documents => "document",
            RecordKind::Communities => "community",
        }
    }

    /// Fields that must be present and non-blank on create.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            RecordKind::Users => &["email"],
            RecordKind::Posts | RecordKind::News => &["title", "content"],
            RecordKind::Businesses => &["name"],
            RecordKind::Resources => &["title"],
            RecordKind::ResourceContent => &["resourceId", "title"],
            RecordKind::Documents => &[],
            RecordKind::Communities => &[FIELD_NAME],
        }
    }

    pub fn from_route_segment(segment: &str) -> Option<Self> {
        [
            RecordKind::Users,
            RecordKind::Posts,
            RecordKind::News,
            RecordKind::Businesses,
            RecordKind::Resources,
            RecordKind::ResourceContent,
            RecordKind::Documents,
            RecordKind::Communities,
        ]
        .into_iter()
        .find(|kind| kind.route_segment() == segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_content_uses_dashed_route_and_camel_collection() {
        let kind = RecordKind::from_route_segment("resource-content").unwrap();
        assert_eq!(kind, RecordKind::ResourceContent);
        assert_eq!(kind.collection(), "resourceContent");
        assert!(RecordKind::from_route_segment("resourceContent").is_none());
    }

    #[test]
    fn association_collections_exclude_communities() {
        assert!(!ASSOCIATION_COLLECTIONS.contains(&COMMUNITIES));
        assert_eq!(ASSOCIATION_COLLECTIONS[0], USERS);
    }
}
