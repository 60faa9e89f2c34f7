use std::collections::BTreeMap;
#[cfg(feature = "builtins")]
use std::sync::Arc;

use crate::environment::TagParser;
#[cfg(feature = "builtins")]
use crate::filters::{self, BoxedFilter};
use crate::filters::Strainer;

pub(crate) fn get_builtin_tags() -> BTreeMap<String, TagParser> {
    #[allow(unused_mut)]
    let mut rv = BTreeMap::new();
    #[cfg(feature = "builtins")]
    {
        use crate::tags::*;

        let mut add = |name: &str, parser: TagParser| {
            rv.insert(name.to_string(), parser);
        };
        add("assign", Arc::new(Assign::parse));
        add("capture", Arc::new(Capture::parse));
        add("echo", Arc::new(Echo::parse));
        add("increment", Arc::new(Counter::parse));
        add("decrement", Arc::new(Counter::parse));
        add("if", Arc::new(If::parse));
        add("unless", Arc::new(If::parse));
        add("case", Arc::new(Case::parse));
        add("for", Arc::new(For::parse));
        add("break", Arc::new(LoopControl::parse));
        add("continue", Arc::new(LoopControl::parse));
        add("cycle", Arc::new(Cycle::parse));
        add("comment", Arc::new(Comment::parse));
        add("raw", Arc::new(Raw::parse));
        add("#", Arc::new(InlineComment::parse));
        add("include", Arc::new(Include::parse));
        add("render", Arc::new(Render::parse));
    }
    rv
}

pub(crate) fn get_builtin_filters() -> Strainer {
    #[allow(unused_mut)]
    let mut rv = Strainer::new();
    #[cfg(feature = "builtins")]
    {
        rv.add("append", BoxedFilter::new(filters::append));
        rv.add("prepend", BoxedFilter::new(filters::prepend));
        rv.add("upcase", BoxedFilter::new(filters::upcase));
        rv.add("downcase", BoxedFilter::new(filters::downcase));
        rv.add("capitalize", BoxedFilter::new(filters::capitalize));
        rv.add("strip", BoxedFilter::new(filters::strip));
        rv.add("lstrip", BoxedFilter::new(filters::lstrip));
        rv.add("rstrip", BoxedFilter::new(filters::rstrip));
        rv.add("strip_newlines", BoxedFilter::new(filters::strip_newlines));
        rv.add("newline_to_br", BoxedFilter::new(filters::newline_to_br));
        rv.add("replace", BoxedFilter::new(filters::replace));
        rv.add("replace_first", BoxedFilter::new(filters::replace_first));
        rv.add("remove", BoxedFilter::new(filters::remove));
        rv.add("remove_first", BoxedFilter::new(filters::remove_first));
        rv.add("split", BoxedFilter::new(filters::split));
        rv.add("truncate", BoxedFilter::new(filters::truncate));
        rv.add("truncatewords", BoxedFilter::new(filters::truncatewords));
        rv.add("escape", BoxedFilter::new(filters::escape));
        rv.add("h", BoxedFilter::new(filters::escape));
        rv.add("escape_once", BoxedFilter::new(filters::escape_once));
        rv.add("join", BoxedFilter::new(filters::join));
        rv.add("first", BoxedFilter::new(filters::first));
        rv.add("last", BoxedFilter::new(filters::last));
        rv.add("size", BoxedFilter::new(filters::size));
        rv.add("reverse", BoxedFilter::new(filters::reverse));
        rv.add("sort", BoxedFilter::new(filters::sort));
        rv.add("sort_natural", BoxedFilter::new(filters::sort_natural));
        rv.add("uniq", BoxedFilter::new(filters::uniq));
        rv.add("compact", BoxedFilter::new(filters::compact));
        rv.add("map", BoxedFilter::new(filters::map));
        rv.add("where", BoxedFilter::new(filters::r#where));
        rv.add("concat", BoxedFilter::new(filters::concat));
        rv.add("slice", BoxedFilter::new(filters::slice));
        rv.add("plus", BoxedFilter::new(filters::plus));
        rv.add("minus", BoxedFilter::new(filters::minus));
        rv.add("times", BoxedFilter::new(filters::times));
        rv.add("divided_by", BoxedFilter::new(filters::divided_by));
        rv.add("modulo", BoxedFilter::new(filters::modulo));
        rv.add("abs", BoxedFilter::new(filters::abs));
        rv.add("ceil", BoxedFilter::new(filters::ceil));
        rv.add("floor", BoxedFilter::new(filters::floor));
        rv.add("round", BoxedFilter::new(filters::round));
        rv.add("at_least", BoxedFilter::new(filters::at_least));
        rv.add("at_most", BoxedFilter::new(filters::at_most));
        rv.add("default", BoxedFilter::new(filters::default));
        #[cfg(feature = "json")]
        {
            rv.add("json", BoxedFilter::new(filters::json));
        }
        #[cfg(feature = "urlencode")]
        {
            rv.add("url_encode", BoxedFilter::new(filters::url_encode));
            rv.add("url_decode", BoxedFilter::new(filters::url_decode));
        }
    }
    rv
}
