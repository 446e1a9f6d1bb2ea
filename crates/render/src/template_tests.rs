use super::*;

fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl FnMut(&str) -> Option<String> + 'a {
    move |name: &str| {
        pairs
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| (*v).to_owned())
    }
}

#[test]
fn renders_named_placeholders() {
    let t = Template::parse("Dear {first_name}, see you at {place}.").expect("parse");
    let out = t
        .render(lookup(&[("first_name", "Ada"), ("place", "Christ's")]))
        .expect("render");
    assert_eq!(out, "Dear Ada, see you at Christ's.");
}

#[test]
fn doubled_braces_are_literal() {
    let t = Template::parse("<style>p {{ color: red }}</style>{x}").expect("parse");
    let out = t.render(lookup(&[("x", "!")])).expect("render");
    assert_eq!(out, "<style>p { color: red }</style>!");
}

#[test]
fn fields_lists_placeholders_in_order() {
    let t = Template::parse("{a}{{b}}{c}{a}").expect("parse");
    let fields: Vec<&str> = t.fields().collect();
    assert_eq!(fields, vec!["a", "c", "a"]);
}

#[test]
fn malformed_templates_are_rejected() {
    let cases = [
        ("Dear {first_name", 5),
        ("Dear first_name}", 15),
        ("{}", 0),
        ("a {b{c}}", 2),
    ];

    for (text, position) in cases {
        match Template::parse(text) {
            Err(RenderError::MalformedTemplate { position: got, .. }) => {
                assert_eq!(got, position, "{text:?}")
            }
            other => panic!("{text:?} should be malformed, got {other:?}"),
        }
    }
}

#[test]
fn missing_value_fails_render() {
    let t = Template::parse("Dear {first_name} {last_name}").expect("parse");
    let err = t
        .render(lookup(&[("first_name", "Ada")]))
        .expect_err("last_name has no value");
    assert_eq!(err, RenderError::MissingField("last_name".into()));
}

#[test]
fn partial_render_keeps_named_placeholders_for_a_second_pass() {
    let t = Template::parse("Dear {receiver}, {{braces}} {table}").expect("parse");

    let first = t
        .render_partial(lookup(&[("table", "<td>{odd}</td>")]), &["receiver"])
        .expect("first pass");
    assert_eq!(first, "Dear {receiver}, {{braces}} <td>{{odd}}</td>");

    let second = Template::parse(&first)
        .expect("reparse")
        .render(lookup(&[("receiver", "Ada")]))
        .expect("second pass");
    assert_eq!(second, "Dear Ada, {braces} <td>{odd}</td>");
}

#[test]
fn rendering_is_deterministic() {
    let t = Template::parse("{a}-{b}-{a}").expect("parse");
    let pairs = [("a", "1"), ("b", "2")];
    let first = t.render(lookup(&pairs)).expect("render");
    let second = t.render(lookup(&pairs)).expect("render");
    assert_eq!(first, second);
    assert_eq!(first, "1-2-1");
}
