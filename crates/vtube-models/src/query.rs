//! Video list queries: filtering, sorting and offset pagination.

use std::cmp::Ordering;

use crate::video::Video;

// ============================================================================
// Pagination
// ============================================================================

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// Offset-based page request (1-indexed pages).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// Build a page request, clamping `page >= 1` and `1 <= limit <= MAX_LIMIT`.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(DEFAULT_PAGE).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of matching documents to skip before this page.
    pub fn skip(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// `ceil(total / limit)`; zero when nothing matches.
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit))
    }
}

// ============================================================================
// Filter
// ============================================================================

/// Video list filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoFilter {
    /// Case-insensitive substring matched against title OR description
    pub text: Option<String>,
    /// Exact owner match
    pub owner: Option<String>,
}

impl VideoFilter {
    /// Build a filter, treating blank parameters as absent.
    pub fn new(text: Option<String>, owner: Option<String>) -> Self {
        fn non_blank(s: Option<String>) -> Option<String> {
            s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        }

        Self {
            text: non_blank(text),
            owner: non_blank(owner),
        }
    }

    pub fn matches(&self, video: &Video) -> bool {
        self.matches_owner(video) && self.matches_text(video)
    }

    pub fn matches_owner(&self, video: &Video) -> bool {
        self.owner.as_deref().map_or(true, |owner| video.owner == owner)
    }

    pub fn matches_text(&self, video: &Video) -> bool {
        match &self.text {
            None => true,
            Some(text) => {
                let needle = text.to_lowercase();
                video.title.to_lowercase().contains(&needle)
                    || video.description.to_lowercase().contains(&needle)
            }
        }
    }
}

// ============================================================================
// Sort
// ============================================================================

/// Supported sort fields for video lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    Duration,
}

impl VideoSortField {
    /// Parse a `sortBy` parameter, returning the default if unknown.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "createdat" | "created_at" => Self::CreatedAt,
            "updatedat" | "updated_at" => Self::UpdatedAt,
            "title" => Self::Title,
            "duration" => Self::Duration,
            _ => Self::CreatedAt,
        }
    }

    /// Field path of this sort key in stored documents.
    pub const fn document_field(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Title => "title",
            Self::Duration => "duration",
        }
    }

    fn compare(&self, a: &Video, b: &Video) -> Ordering {
        match self {
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            Self::Title => a.title.cmp(&b.title),
            Self::Duration => a.duration.total_cmp(&b.duration),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    /// Parse a `sortType` parameter: `asc` sorts ascending, anything else descending.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" | "1" => Self::Ascending,
            _ => Self::Descending,
        }
    }
}

/// Complete sort configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortSpec {
    pub field: VideoSortField,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: VideoSortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    pub fn from_params(field: Option<&str>, direction: Option<&str>) -> Self {
        Self {
            field: field.map(VideoSortField::from_str_or_default).unwrap_or_default(),
            direction: direction.map(SortDirection::from_str_or_default).unwrap_or_default(),
        }
    }

    /// Order two videos; ties break on ID in the same direction.
    pub fn compare(&self, a: &Video, b: &Video) -> Ordering {
        let ordering = self
            .field
            .compare(a, b)
            .then_with(|| a.id.cmp(&b.id));

        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

// ============================================================================
// Query / Page
// ============================================================================

/// Full list query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoQuery {
    pub filter: VideoFilter,
    pub sort: SortSpec,
    pub page: PageRequest,
}

/// One page of results plus the total number of matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoPage {
    pub items: Vec<Video>,
    pub total: u64,
}

impl VideoPage {
    /// Slice an already filtered and sorted result set.
    pub fn from_sorted(videos: Vec<Video>, page: &PageRequest) -> Self {
        let total = videos.len() as u64;
        let skip = usize::try_from(page.skip()).unwrap_or(usize::MAX);
        let items = videos
            .into_iter()
            .skip(skip)
            .take(page.limit() as usize)
            .collect();

        Self { items, total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::VideoId;
    use chrono::{Duration, Utc};

    fn video(title: &str, description: &str, owner: &str, age_secs: i64) -> Video {
        let created = Utc::now() - Duration::seconds(age_secs);
        Video {
            id: VideoId::new(),
            video_file: "https://media.example/v.mp4".to_string(),
            thumbnail: "https://media.example/t.jpg".to_string(),
            title: title.to_string(),
            description: description.to_string(),
            duration: age_secs as f64,
            owner: owner.to_string(),
            is_published: true,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_page_request_clamps() {
        let page = PageRequest::new(Some(0), Some(0));
        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), 1);

        let page = PageRequest::new(None, Some(5000));
        assert_eq!(page.limit(), MAX_LIMIT);

        let page = PageRequest::new(None, None);
        assert_eq!((page.page(), page.limit()), (DEFAULT_PAGE, DEFAULT_LIMIT));
    }

    #[test]
    fn test_skip_and_total_pages() {
        let page = PageRequest::new(Some(2), Some(5));
        assert_eq!(page.skip(), 5);
        assert_eq!(page.total_pages(12), 3);
        assert_eq!(page.total_pages(10), 2);
        assert_eq!(page.total_pages(0), 0);
    }

    #[test]
    fn test_text_filter_is_case_insensitive_over_title_or_description() {
        let filter = VideoFilter::new(Some("RuSt".to_string()), None);

        assert!(filter.matches(&video("Learning rust", "", "u1", 1)));
        assert!(filter.matches(&video("Cooking", "with RUST pans", "u1", 1)));
        assert!(!filter.matches(&video("Go", "gophers", "u1", 1)));
    }

    #[test]
    fn test_owner_filter_is_exact() {
        let filter = VideoFilter::new(None, Some("u1".to_string()));
        assert!(filter.matches(&video("a", "b", "u1", 1)));
        assert!(!filter.matches(&video("a", "b", "u10", 1)));
    }

    #[test]
    fn test_blank_filter_params_are_ignored() {
        let filter = VideoFilter::new(Some("   ".to_string()), Some(String::new()));
        assert_eq!(filter, VideoFilter::default());
    }

    #[test]
    fn test_sort_param_parsing() {
        assert_eq!(
            VideoSortField::from_str_or_default("createdAt"),
            VideoSortField::CreatedAt
        );
        assert_eq!(
            VideoSortField::from_str_or_default("duration"),
            VideoSortField::Duration
        );
        assert_eq!(
            VideoSortField::from_str_or_default("views"),
            VideoSortField::CreatedAt
        );
        assert_eq!(SortDirection::from_str_or_default("asc"), SortDirection::Ascending);
        assert_eq!(SortDirection::from_str_or_default("desc"), SortDirection::Descending);
        assert_eq!(SortDirection::from_str_or_default("sideways"), SortDirection::Descending);
    }

    #[test]
    fn test_default_sort_is_newest_first() {
        let mut videos = vec![video("old", "", "u", 30), video("new", "", "u", 1), video("mid", "", "u", 10)];
        let sort = SortSpec::default();
        videos.sort_by(|a, b| sort.compare(a, b));

        let titles: Vec<&str> = videos.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_page_slicing() {
        let videos: Vec<Video> = (0..12).map(|i| video(&format!("v{i}"), "", "u", i)).collect();
        let page = VideoPage::from_sorted(videos, &PageRequest::new(Some(2), Some(5)));

        assert_eq!(page.total, 12);
        let titles: Vec<&str> = page.items.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, vec!["v5", "v6", "v7", "v8", "v9"]);

        let last = VideoPage::from_sorted(
            (0..12).map(|i| video(&format!("v{i}"), "", "u", i)).collect(),
            &PageRequest::new(Some(3), Some(5)),
        );
        assert_eq!(last.items.len(), 2);
    }
}
