/// Selector profile for one version of the review listing markup.
///
/// Every string here is tied to the page as it rendered when the profile was
/// captured. When the listing changes shape, add a new profile rather than
/// editing this one so older snapshots stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub version: &'static str,

    // Listing
    pub review_card: &'static str,
    pub current_page: &'static str,
    pub page_container: &'static str,

    // Card-level markers
    pub featured_flag: &'static str,
    pub author_line: &'static str,
    pub author_detail: &'static str,
    pub anonymous_marker: &'static str,

    // Fields
    pub status_line: &'static str,
    pub review_title: &'static str,
    pub review_body: &'static str,
    pub helpful: &'static str,
    pub pros: &'static str,
    pub cons: &'static str,
    pub advice: &'static str,
    pub overall_rating: &'static str,
    pub sub_rating_rows: &'static str,
    pub sub_rating_label: &'static str,
    pub sub_rating_stars: &'static str,
    pub recommend_items: &'static str,
    pub recommend_icon: &'static str,
}

pub const LISTING_2022: Layout = Layout {
    version: "2022-08",

    review_card: ".empReview",
    current_page: ".selected",
    page_container: ".pageContainer",

    featured_flag: ".featuredFlag",
    author_line: ".common__EiReviewDetailsStyle__newUiJobLine",
    author_detail: ".common__EiReviewDetailsStyle__newGrey",
    anonymous_marker: "Anonymous Employee",

    status_line: ".pt-xsm",
    review_title: ".reviewLink",
    review_body: ".gdReview",
    helpful: ".common__EiReviewDetailsStyle__socialHelpfulcontainer",
    pros: "[data-test='pros']",
    cons: "[data-test='cons']",
    advice: "[data-test='advice-management']",
    overall_rating: ".ratingNumber",
    sub_rating_rows: "aside ul > li",
    sub_rating_label: "div:nth-child(1)",
    sub_rating_stars: "[font-size='sm']",
    recommend_items: ".recommends > div",
    recommend_icon: "svg",
};

impl Default for Layout {
    fn default() -> Self {
        LISTING_2022
    }
}
