//! Registered resources.

use super::ModelDescriptor;
use crate::api::format::user_view;

const SLUG: &[&str] = &["slug"];

pub const ARTICLES: ModelDescriptor = ModelDescriptor::new("Article", "articles").unique(SLUG);
pub const BREEDS: ModelDescriptor = ModelDescriptor::new("Breed", "breeds");
pub const CATEGORIES: ModelDescriptor = ModelDescriptor::new("Category", "categories");
pub const CERTIFICATES: ModelDescriptor = ModelDescriptor::new("Certificate", "certificates");
pub const COMMENTS: ModelDescriptor = ModelDescriptor::new("Comment", "comments");
pub const COURSES: ModelDescriptor = ModelDescriptor::new("Course", "courses").unique(SLUG);
pub const DOGS: ModelDescriptor = ModelDescriptor::new("Dog", "dogs");
pub const LESSONS: ModelDescriptor = ModelDescriptor::new("Lesson", "lessons").unique(SLUG);
pub const MASSAGES: ModelDescriptor = ModelDescriptor::new("Massage", "massages");
pub const MEDIA: ModelDescriptor = ModelDescriptor::new("Media", "media")
    .unique(&["url"])
    .queryable(&["fileName", "altText", "slug", "url", "mediaType"]);
pub const QUIZZES: ModelDescriptor = ModelDescriptor::new("Quiz", "quizzes").unique(SLUG);
pub const REVIEWS: ModelDescriptor = ModelDescriptor::new("Review", "reviews");
pub const SECTIONS: ModelDescriptor = ModelDescriptor::new("Section", "sections").unique(SLUG);
pub const STATIC_PAGES: ModelDescriptor = ModelDescriptor::new("StaticPage", "static-pages");
pub const TAGS: ModelDescriptor = ModelDescriptor::new("Tag", "tags");
pub const USERS: ModelDescriptor = ModelDescriptor::new("User", "users")
    .unique(&["email"])
    .queryable(&["email", "userName", "firstName", "lastName"])
    .protected(&["password", "roles", "resetToken", "resetTokenExpiry"])
    .view(user_view);

/// Mounted under `/api/v1/<collection>`
pub const MODELS: &[ModelDescriptor] = &[
    ARTICLES,
    BREEDS,
    CATEGORIES,
    CERTIFICATES,
    COMMENTS,
    COURSES,
    DOGS,
    LESSONS,
    MASSAGES,
    MEDIA,
    QUIZZES,
    REVIEWS,
    SECTIONS,
    STATIC_PAGES,
    TAGS,
    USERS,
];

pub fn find(collection: &str) -> Option<&'static ModelDescriptor> {
    MODELS.iter().find(|m| m.collection == collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::store::validate_collection_name;

    #[test]
    fn registry_collections_are_valid_and_distinct() {
        let mut seen = std::collections::BTreeSet::new();
        for model in MODELS {
            assert!(validate_collection_name(model.collection).is_ok(), "{}", model.collection);
            assert!(seen.insert(model.collection));
        }
    }

    #[test]
    fn slugged_units_are_unique_on_slug() {
        for name in ["articles", "courses", "lessons", "quizzes", "sections"] {
            assert_eq!(find(name).unwrap().unique_fields, &["slug"]);
        }
        assert_eq!(find("media").unwrap().unique_fields, &["url"]);
        assert!(find("unknown").is_none());
    }
}
