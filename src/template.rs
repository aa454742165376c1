use askama_actix::Template;
use std::ops::Range;

const PAGINATOR_LOOK_AHEAD: i32 = 2;

/// [1] 2 3 ... 13
/// 1 2 [3] 4 5 ... 13
/// 1 2 3 4 [5] 6 7 ... 13
/// 1 ... 4 5 [6] 7 8 ... 13
/// 1 ... 7 8 [9] 10 11 12 13
/// 1 ... 9 10 [11] 12 13
/// 1 ... 11 12 [13]
#[derive(Clone, Debug)]
pub struct Paginator {
    pub base_url: String,
    pub this_page: i32,
    pub page_count: i32,
}

#[derive(Template)]
#[template(path = "util/paginator.html")]
struct PaginatorTemplate<'a> {
    paginator: &'a Paginator,
}

pub trait PaginatorToHtml {
    fn as_html(&self) -> String;
    fn has_pages(&self) -> bool;
    fn get_first_pages(&self) -> Range<i32>;
    fn get_inner_pages(&self) -> Option<Range<i32>>;
    fn get_last_pages(&self) -> Option<Range<i32>>;
    fn page_url(&self, page: i32) -> String;
}

impl PaginatorToHtml for Paginator {
    fn has_pages(&self) -> bool {
        self.page_count > 1
    }

    // Ranges are inclusive of their end page, hence the `+ 1`.
    fn get_first_pages(&self) -> Range<i32> {
        if 1 + PAGINATOR_LOOK_AHEAD < self.this_page - PAGINATOR_LOOK_AHEAD {
            // if 1+lookahead is less than page-lookahead, we only show page 1
            // i.e. any page starting with 6
            1..2
        } else if self.this_page + PAGINATOR_LOOK_AHEAD < self.page_count - PAGINATOR_LOOK_AHEAD {
            // on page 4 of 9, show 1-6 ... 9
            1..(self.this_page + PAGINATOR_LOOK_AHEAD + 1)
        } else {
            // otherwise, just show all pages.
            1..(self.page_count + 1)
        }
    }

    fn get_inner_pages(&self) -> Option<Range<i32>> {
        if 1 + PAGINATOR_LOOK_AHEAD >= self.this_page - PAGINATOR_LOOK_AHEAD {
            None
        } else if self.this_page + PAGINATOR_LOOK_AHEAD >= self.page_count - PAGINATOR_LOOK_AHEAD {
            // lookahead touches the last pages; they are merged there
            None
        } else {
            // i.e. 1 .. 4 5 [6] 7 8 .. 11 (minimum number)
            Some((self.this_page - PAGINATOR_LOOK_AHEAD)..(self.this_page + PAGINATOR_LOOK_AHEAD + 1))
        }
    }

    fn get_last_pages(&self) -> Option<Range<i32>> {
        if 1 + PAGINATOR_LOOK_AHEAD >= self.this_page - PAGINATOR_LOOK_AHEAD {
            if self.this_page + PAGINATOR_LOOK_AHEAD < self.page_count - PAGINATOR_LOOK_AHEAD {
                Some(self.page_count..(self.page_count + 1))
            } else {
                // first pages already run to the end
                None
            }
        } else if self.this_page + PAGINATOR_LOOK_AHEAD < self.page_count - PAGINATOR_LOOK_AHEAD {
            Some(self.page_count..(self.page_count + 1))
        } else {
            Some((self.this_page - PAGINATOR_LOOK_AHEAD)..(self.page_count + 1))
        }
    }

    fn page_url(&self, page: i32) -> String {
        format!("{}?page={}", self.base_url, page)
    }

    fn as_html(&self) -> String {
        if self.has_pages() {
            let mut buffer = String::new();
            let template = PaginatorTemplate { paginator: self };
            if template.render_into(&mut buffer).is_err() {
                "[Paginator Util Error]".to_owned()
            } else {
                buffer
            }
        } else {
            "".to_owned()
        }
    }
}
