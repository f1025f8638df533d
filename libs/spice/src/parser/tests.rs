use super::*;

use test_log::test;

pub const SPICE_INV: &str = r#"
.subckt inv a y vdd vss
MN0 y a vss vss nch w=100n
.ends
"#;

pub const SPICE_NAND2: &str = r#"* two input nand
.SUBCKT nand2 A B Y VDD VSS
*.PININFO A:I B:I Y:O VDD:B VSS:B
MP0 Y A VDD VDD pch w=200n
+ l=20n
MP1 Y B VDD VDD pch w=200n l=20n $ parallel pull-up
* series pull-down
MN0 Y A n1 VSS nch
+ w=200n l=20n
MN1 n1 B VSS VSS nch w=200n l=20n
.ENDS nand2
.end
"#;

fn logical_lines(data: &str) -> Vec<Vec<Token>> {
    let mut lexer = Lexer::new(&Substr::from(data));
    std::iter::from_fn(|| lexer.next_line().unwrap()).collect()
}

#[test]
fn spice_inv_tokens() {
    let ident = |s: &str| Token::Ident(s.into());
    assert_eq!(
        logical_lines(SPICE_INV),
        vec![
            vec![
                Token::Directive(".subckt".into()),
                ident("inv"),
                ident("a"),
                ident("y"),
                ident("vdd"),
                ident("vss"),
            ],
            vec![
                ident("MN0"),
                ident("y"),
                ident("a"),
                ident("vss"),
                ident("vss"),
                ident("nch"),
                ident("w"),
                Token::Equals,
                ident("100n"),
            ],
            vec![Token::Directive(".ends".into())],
        ]
    );
}

#[test]
fn continuations_are_joined_and_comments_dropped() {
    let lines = logical_lines(SPICE_NAND2);
    assert_eq!(lines.len(), 8);
    assert_eq!(lines[1][0], Token::MetaDirective("PININFO".into()));
    // `MP0` spans two lines; `MP1` ends in a `$` comment.
    assert_eq!(lines[2].len(), 12);
    assert_eq!(lines[3].len(), 12);
    assert_eq!(lines[4][0], Token::Ident("MN0".into()));
    assert_eq!(lines[4].last(), Some(&Token::Ident("20n".into())));
}

#[test]
fn parse_nand2() {
    let parsed = Parser::parse(SPICE_NAND2).unwrap();
    assert_eq!(parsed.name, "* two input nand");
    assert_eq!(parsed.ast.elems.len(), 1);

    let nand2 = parsed.subckt("NAND2").unwrap();
    assert_eq!(
        nand2.ports,
        vec![
            Substr::from("A"),
            "B".into(),
            "Y".into(),
            "VDD".into(),
            "VSS".into()
        ]
    );

    let pins = nand2.pin_info.as_ref().unwrap();
    assert_eq!(pins.len(), 5);
    assert_eq!(pins.get("Y"), Some(&PinDir::Output));
    assert_eq!(pins.get("VDD"), Some(&PinDir::InOut));

    let mos = nand2.mosfets().collect::<Vec<_>>();
    assert_eq!(mos.len(), 4);
    assert_eq!(mos[0].name, "MP0".into());
    assert_eq!(mos[0].params.get("L").map(|s| s.as_str()), Some("20n"));
    assert_eq!(mos[1].params.len(), 2);

    let mn0 = mos[2];
    assert_eq!(mn0.d, "Y".into());
    assert_eq!(mn0.g, "A".into());
    assert_eq!(mn0.s, "n1".into());
    assert_eq!(mn0.b, "VSS".into());
    assert_eq!(mn0.model, "nch".into());
    assert_eq!(mn0.params.get("w").map(|s| s.as_str()), Some("200n"));
}

#[test]
fn missing_ends_is_an_error() {
    let err = Parser::parse(".subckt inv a y vdd vss\nMN0 y a vss vss nch\n").unwrap_err();
    assert!(matches!(err, ParserError::UnterminatedSubckt(name) if name.as_str() == "inv"));
}

#[test]
fn unsupported_lines_are_rejected() {
    let err = Parser::parse(".subckt r a b\nR0 a b 100\n.ends\n").unwrap_err();
    assert!(matches!(err, ParserError::UnexpectedComponentType('R')));

    let err = Parser::parse(".ends\n").unwrap_err();
    assert!(matches!(err, ParserError::UnexpectedLine(_)));

    let err = Parser::parse(".subckt inv a y\nMN0 y a vss vss nch w 100n\n.ends\n").unwrap_err();
    assert!(matches!(err, ParserError::InvalidLine { .. }));

    let err = Parser::parse(".subckt inv a y\nMN0 y a vss\n.ends\n").unwrap_err();
    assert!(matches!(err, ParserError::InvalidLine { .. }));
}

#[test]
fn leading_continuation_is_a_tokenizer_error() {
    let err = Parser::parse("+ a b\n").unwrap_err();
    assert!(matches!(err, ParserError::Tokenizer(_)));
}

#[test]
fn text_after_end_is_ignored() {
    let parsed = Parser::parse(".subckt inv a y vdd vss\nMN0 y a vss vss nch\n.ends\n.end\nR0 a b 1\n").unwrap();
    assert_eq!(parsed.subckts().count(), 1);
    assert_eq!(parsed.subckt("INV").unwrap().mosfets().count(), 1);
}
