//! HTML 结构提取器
//! 负责从 HTML 中提取标题、meta 描述、链接、图片、表单与正文文本

use std::cell::RefCell;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts
};
use markup5ever::interface::Attribute;
use tendril::StrTendril;
use url::Url;

use crate::model::{FormInput, PageForm, PageImage, PageLink};

/// 正文文本中需要忽略的元素
const SKIPPED_TEXT_TAGS: [&str; 5] = ["script", "style", "noscript", "template", "title"];

/// 提取结果
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExtractResult {
    pub title: String,
    pub meta_description: String,
    pub meta_keywords: String,
    pub text_content: String,
    pub links: Vec<PageLink>,
    pub images: Vec<PageImage>,
    pub forms: Vec<PageForm>,
}

/// 进行中的 <a> 标签
#[derive(Debug, Default)]
struct OpenLink {
    href: String,
    title: String,
    text: String,
}

#[derive(Debug, Default)]
struct ExtractState {
    result: ExtractResult,
    skip_depth: usize,
    in_title: bool,
    open_link: Option<OpenLink>,
    open_form: Option<PageForm>,
}

#[derive(Debug, Default)]
pub struct HtmlExtractor {
    base: Option<Url>,
    state: RefCell<ExtractState>,
}

impl TokenSink for HtmlExtractor {
    type Handle = ();

    fn process_token(&self, token: Token, _line: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(Tag { kind: TagKind::StartTag, name, attrs, self_closing, .. }) => {
                self.start_tag(name.as_ref(), &attrs, self_closing)
            }
            Token::TagToken(Tag { kind: TagKind::EndTag, name, .. }) => self.end_tag(name.as_ref()),
            Token::CharacterTokens(text) => self.characters(&text),
            _ => {}
        }
        TokenSinkResult::Continue
    }
}

impl HtmlExtractor {
    /// 创建提取器，`base` 用于把相对链接解析为绝对地址
    pub fn new(base: Option<Url>) -> Self {
        Self {
            base,
            state: RefCell::new(ExtractState::default()),
        }
    }

    /// 从HTML字符串提取结构化内容
    pub fn extract(html: &str, base: Option<Url>) -> ExtractResult {
        let tokenizer = Tokenizer::new(Self::new(base), TokenizerOpts::default());
        let queue = BufferQueue::default();
        queue.push_back(StrTendril::from(html));

        let _ = tokenizer.feed(&queue);
        tokenizer.end();

        tokenizer.sink.finish()
    }

    fn finish(self) -> ExtractResult {
        let mut state = self.state.into_inner();
        // 未闭合的表单也计入结果
        if let Some(form) = state.open_form.take() {
            state.result.forms.push(form);
        }
        state.result.title = collapse_whitespace(&state.result.title);
        state.result.text_content = collapse_whitespace(&state.result.text_content);
        state.result
    }

    fn start_tag(&self, name: &str, attrs: &[Attribute], self_closing: bool) {
        let mut state = self.state.borrow_mut();
        if SKIPPED_TEXT_TAGS.contains(&name) && !self_closing {
            state.skip_depth += 1;
        }
        match name {
            "title" => state.in_title = true,
            "meta" => Self::meta_tag(&mut state.result, attrs),
            "a" => {
                if let Some(href) = attr(attrs, "href") {
                    state.open_link = Some(OpenLink {
                        href: self.resolve(&href),
                        title: attr(attrs, "title").unwrap_or_default(),
                        text: String::new(),
                    });
                }
            }
            "img" => {
                if let Some(src) = attr(attrs, "src").filter(|s| !s.trim().is_empty()) {
                    state.result.images.push(PageImage {
                        src: self.resolve(&src),
                        alt: attr(attrs, "alt").unwrap_or_default(),
                        title: attr(attrs, "title").unwrap_or_default(),
                    });
                }
            }
            "form" => {
                // 嵌套的 form 不合法，遇到新 form 时先收起上一个
                if let Some(form) = state.open_form.take() {
                    state.result.forms.push(form);
                }
                state.open_form = Some(PageForm {
                    action: self.resolve(&attr(attrs, "action").unwrap_or_default()),
                    method: attr(attrs, "method")
                        .map(|m| m.to_uppercase())
                        .unwrap_or_else(|| "GET".to_string()),
                    inputs: Vec::new(),
                });
            }
            "input" | "select" | "textarea" => {
                if let Some(form) = state.open_form.as_mut() {
                    form.inputs.push(FormInput {
                        input_type: attr(attrs, "type")
                            .map(|t| t.to_lowercase())
                            .unwrap_or_else(|| if name == "input" { "text".to_string() } else { name.to_string() }),
                        name: attr(attrs, "name").unwrap_or_default(),
                        placeholder: attr(attrs, "placeholder").unwrap_or_default(),
                        required: attrs.iter().any(|a| a.name.local.as_ref() == "required"),
                    });
                }
            }
            _ => {}
        }
    }

    fn end_tag(&self, name: &str) {
        let mut state = self.state.borrow_mut();
        if SKIPPED_TEXT_TAGS.contains(&name) {
            state.skip_depth = state.skip_depth.saturating_sub(1);
        }
        match name {
            "title" => state.in_title = false,
            "a" => {
                if let Some(link) = state.open_link.take() {
                    let text = collapse_whitespace(&link.text);
                    // 与浏览器端抓取保持一致：丢弃无文本或无地址的链接
                    if !text.is_empty() && !link.href.is_empty() {
                        state.result.links.push(PageLink { text, href: link.href, title: link.title });
                    }
                }
            }
            "form" => {
                if let Some(form) = state.open_form.take() {
                    state.result.forms.push(form);
                }
            }
            _ => {}
        }
    }

    fn characters(&self, text: &str) {
        let mut state = self.state.borrow_mut();
        if state.in_title {
            state.result.title.push_str(text);
        }
        if state.skip_depth > 0 {
            return;
        }
        if let Some(link) = state.open_link.as_mut() {
            link.text.push_str(text);
        }
        state.result.text_content.push_str(text);
        state.result.text_content.push(' ');
    }

    fn meta_tag(result: &mut ExtractResult, attrs: &[Attribute]) {
        let (Some(name), Some(content)) = (attr(attrs, "name"), attr(attrs, "content")) else {
            return;
        };
        match name.to_lowercase().as_str() {
            "description" => result.meta_description = content,
            "keywords" => result.meta_keywords = content,
            _ => {}
        }
    }

    /// 相对地址转绝对地址；无 base 或解析失败时原样返回
    fn resolve(&self, raw: &str) -> String {
        let raw = raw.trim();
        match &self.base {
            Some(base) => base.join(raw).map(|u| u.to_string()).unwrap_or_else(|_| raw.to_string()),
            None => raw.to_string(),
        }
    }
}

fn attr(attrs: &[Attribute], name: &str) -> Option<String> {
    attrs
        .iter()
        .find(|a| a.name.local.as_ref() == name)
        .map(|a| a.value.to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
