pub mod blocks;
pub mod extract;

use scraper::Html;

use blocks::Block;

/// A catalog page parsed once and shared by every extraction strategy.
pub struct Page {
    pub html: Html,
    pub blocks: Vec<Block>,
    pub text: String,
    pub title: Option<String>,
}

impl Page {
    pub fn parse(content: &str) -> Page {
        let html = Html::parse_document(content);
        let blocks = blocks::classify(&html);
        let text = blocks::flatten_text(&html);
        let title = blocks::title(&html);
        Page {
            html,
            blocks,
            text,
            title,
        }
    }
}
