use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};

use crate::Result;
use crate::error::Error;
use crate::soap::{ARRAY_OF_STRING, Call, Param, Reply, STRING};

const ENVELOPE_OPEN: &str = concat!(
    r#"<?xml version="1.0" encoding="utf-8"?>"#,
    r#"<soap:Envelope xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" "#,
    r#"xmlns:xsd="http://www.w3.org/2001/XMLSchema" "#,
    r#"xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">"#,
    "<soap:Body>",
);
const ENVELOPE_CLOSE: &str = "</soap:Body></soap:Envelope>";

/// What the body of a response envelope held.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Body {
    Result(Reply),
    Fault { code: String, reason: String },
}

/// Renders `call` as a SOAP 1.1 request envelope in `namespace`.
pub(crate) fn encode(namespace: &str, call: &Call) -> String {
    let mut xml = String::from(ENVELOPE_OPEN);
    let operation = call.operation();
    let namespace = escape(namespace);

    if call.params().is_empty() {
        xml.push_str(&format!(r#"<{operation} xmlns="{namespace}" />"#));
    } else {
        xml.push_str(&format!(r#"<{operation} xmlns="{namespace}">"#));
        for (name, value) in call.params() {
            xml.push_str(&format!("<{name}>"));
            write_param(&mut xml, value);
            xml.push_str(&format!("</{name}>"));
        }
        xml.push_str(&format!("</{operation}>"));
    }

    xml.push_str(ENVELOPE_CLOSE);
    xml
}

fn write_param(xml: &mut String, value: &Param) {
    match value {
        Param::Text(text) => xml.push_str(&escape(text.as_str())),
        Param::Int(number) => xml.push_str(&number.to_string()),
        Param::Bool(flag) => xml.push_str(&flag.to_string()),
        Param::Binary(bytes) => xml.push_str(&STANDARD.encode(bytes)),
        Param::Table(rows) => {
            for row in rows {
                xml.push_str(&format!("<{ARRAY_OF_STRING}>"));
                for cell in row {
                    xml.push_str(&format!(
                        "<{STRING}>{}</{STRING}>",
                        escape(cell.as_str())
                    ));
                }
                xml.push_str(&format!("</{ARRAY_OF_STRING}>"));
            }
        }
    }
}

/// Extracts the `{operation}Result` element or the fault from a response envelope.
pub(crate) fn decode(operation: &str, xml: &str) -> Result<Body> {
    let document = parse(xml)?;

    let body = document
        .children()
        .iter()
        .find(|node| node.name() == "Envelope")
        .and_then(|envelope| child(envelope, "Body"))
        .ok_or_else(|| Error::decode(format!("{operation} response has no SOAP body")))?;

    let payload = body
        .children()
        .first()
        .ok_or_else(|| Error::decode(format!("{operation} response body is empty")))?;

    if payload.name() == "Fault" {
        return Ok(fault(payload));
    }

    let response_name = format!("{operation}Response");
    if payload.name() != response_name {
        return Err(Error::decode(format!(
            "expected {response_name}, got {}",
            payload.name()
        )));
    }

    let result_name = format!("{operation}Result");
    Ok(Body::Result(
        child(payload, &result_name)
            .cloned()
            .unwrap_or_else(Reply::missing),
    ))
}

fn fault(node: &Reply) -> Body {
    // SOAP 1.1 names first, then the SOAP 1.2 Code/Value and Reason/Text pairs
    let code = child(node, "faultcode")
        .or_else(|| child(node, "Code").and_then(|code| child(code, "Value")))
        .map(text)
        .unwrap_or_default();
    let reason = child(node, "faultstring")
        .or_else(|| child(node, "Reason").and_then(|reason| child(reason, "Text")))
        .map(text)
        .unwrap_or_default();

    Body::Fault { code, reason }
}

fn child<'r>(node: &'r Reply, name: &str) -> Option<&'r Reply> {
    node.children().iter().find(|child| child.name() == name)
}

fn text(node: &Reply) -> String {
    node.text.trim().to_owned()
}

/// Builds the element tree of `xml`, keyed by local names.
///
/// Leaf text is kept verbatim. Whitespace between child elements is dropped.
fn parse(xml: &str) -> Result<Reply> {
    let mut reader = Reader::from_str(xml);

    let mut stack = vec![Reply::empty()];
    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(Reply::element(&local_name(&start)?, String::new())),
            Event::Empty(start) => {
                let node = Reply::element(&local_name(&start)?, String::new());
                top(&mut stack)?.push_child(node);
            }
            Event::Text(content) => {
                let content = content.unescape()?;
                top(&mut stack)?.push_text(&content);
            }
            Event::CData(data) => {
                let content = String::from_utf8_lossy(&data).into_owned();
                top(&mut stack)?.push_text(&content);
            }
            Event::End(_) => {
                let mut node = stack
                    .pop()
                    .ok_or_else(|| Error::decode("unbalanced closing tag"))?;
                if !node.children.is_empty() && node.text.trim().is_empty() {
                    node.text.clear();
                }
                top(&mut stack)?.push_child(node);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(document), true) => Ok(document),
        _ => Err(Error::decode("truncated XML document")),
    }
}

fn top(stack: &mut [Reply]) -> Result<&mut Reply> {
    stack
        .last_mut()
        .ok_or_else(|| Error::decode("unbalanced closing tag"))
}

fn local_name(start: &BytesStart<'_>) -> Result<String> {
    std::str::from_utf8(start.local_name().as_ref())
        .map(str::to_owned)
        .map_err(|e| Error::decode(format!("element name is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Kind;

    const NS: &str = "http://api.livedocx.com/1.2/mailmerge/";

    fn envelope(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>{body}</soap:Body>
</soap:Envelope>"#
        )
    }

    #[test]
    fn encode_escapes_text_parameters() {
        let call = Call::new("LogIn")
            .text("username", "ann")
            .text("password", "<p&ss>");

        let xml = encode(NS, &call);

        assert!(
            xml.contains(&format!(
                r#"<LogIn xmlns="{NS}"><username>ann</username><password>&lt;p&amp;ss&gt;</password></LogIn>"#
            )),
            "unexpected envelope: {xml}"
        );
        assert!(xml.ends_with("</soap:Body></soap:Envelope>"), "{xml}");
    }

    #[test]
    fn encode_parameterless_call_as_empty_element() {
        let xml = encode(NS, &Call::new("CreateDocument"));

        assert!(
            xml.contains(&format!(r#"<CreateDocument xmlns="{NS}" />"#)),
            "unexpected envelope: {xml}"
        );
    }

    #[test]
    fn encode_tables_and_binaries() {
        let call = Call::new("SetFieldValues")
            .table(
                "fieldValues",
                vec![
                    vec!["name".to_owned(), "city".to_owned()],
                    vec!["Ann".to_owned(), "Ayr & Troon".to_owned()],
                ],
            )
            .binary("template", b"hello".to_vec())
            .int("zoomFactor", 100)
            .bool("ignoreSubTemplates", true);

        let xml = encode(NS, &call);

        assert!(xml.contains(
            "<fieldValues>\
             <ArrayOfString><string>name</string><string>city</string></ArrayOfString>\
             <ArrayOfString><string>Ann</string><string>Ayr &amp; Troon</string></ArrayOfString>\
             </fieldValues>"
        ));
        assert!(xml.contains("<template>aGVsbG8=</template>"), "{xml}");
        assert!(xml.contains("<zoomFactor>100</zoomFactor>"), "{xml}");
        assert!(
            xml.contains("<ignoreSubTemplates>true</ignoreSubTemplates>"),
            "{xml}"
        );
    }

    #[test]
    fn decode_text_result() {
        let xml = envelope(&format!(
            r#"<RetrieveDocumentResponse xmlns="{NS}">
                 <RetrieveDocumentResult>JVBERi0xLjQ=</RetrieveDocumentResult>
               </RetrieveDocumentResponse>"#
        ));

        let Body::Result(reply) = decode("RetrieveDocument", &xml).expect("decodes") else {
            panic!("expected a result");
        };
        assert_eq!(reply.into_binary().expect("base64"), b"%PDF-1.4");
    }

    #[test]
    fn decode_string_arrays_and_entities() {
        let xml = envelope(&format!(
            r#"<GetFieldNamesResponse xmlns="{NS}">
                 <GetFieldNamesResult>
                   <string>name</string>
                   <string>r&amp;d</string>
                   <string><![CDATA[<raw>]]></string>
                 </GetFieldNamesResult>
               </GetFieldNamesResponse>"#
        ));

        let Body::Result(reply) = decode("GetFieldNames", &xml).expect("decodes") else {
            panic!("expected a result");
        };
        assert_eq!(reply.into_strings(), ["name", "r&d", "<raw>"]);
    }

    #[test]
    fn decode_keeps_string_whitespace() {
        let xml = envelope(&format!(
            r#"<GetFieldNamesResponse xmlns="{NS}">
                 <GetFieldNamesResult>
                   <string>  padded  </string>
                   <string> </string>
                 </GetFieldNamesResult>
               </GetFieldNamesResponse>"#
        ));

        let Body::Result(reply) = decode("GetFieldNames", &xml).expect("decodes") else {
            panic!("expected a result");
        };
        assert_eq!(reply.into_strings(), ["  padded  ", " "]);
    }

    #[test]
    fn decode_missing_result_as_missing() {
        let xml = envelope(&format!(r#"<CreateDocumentResponse xmlns="{NS}" />"#));

        let Body::Result(reply) = decode("CreateDocument", &xml).expect("decodes") else {
            panic!("expected a result");
        };
        assert!(reply.is_missing());

        let xml = envelope(&format!(r#"<RetrieveDocumentResponse xmlns="{NS}" />"#));
        let Body::Result(reply) = decode("RetrieveDocument", &xml).expect("decodes") else {
            panic!("expected a result");
        };
        assert_eq!(reply.into_binary().unwrap_err().kind(), Kind::Remote);
    }

    #[test]
    fn decode_rejects_response_for_another_operation() {
        let xml = envelope(&format!(r#"<LogInResponse xmlns="{NS}" />"#));

        let err = decode("RetrieveDocument", &xml).unwrap_err();

        assert_eq!(err.kind(), Kind::Remote);
        assert!(err.to_string().contains("RetrieveDocumentResponse"), "{err}");
    }

    #[test]
    fn decode_rejects_empty_body() {
        let err = decode("LogIn", &envelope("")).unwrap_err();
        assert_eq!(err.kind(), Kind::Remote);
    }

    #[test]
    fn decode_soap11_fault() {
        let xml = envelope(
            "<soap:Fault>\
               <faultcode>soap:Server</faultcode>\
               <faultstring>Template not set</faultstring>\
             </soap:Fault>",
        );

        assert_eq!(
            decode("CreateDocument", &xml).expect("decodes"),
            Body::Fault {
                code: "soap:Server".to_owned(),
                reason: "Template not set".to_owned(),
            }
        );
    }

    #[test]
    fn decode_soap12_fault() {
        let xml = r#"<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope">
              <env:Body><env:Fault>
                <env:Code><env:Value>env:Sender</env:Value></env:Code>
                <env:Reason><env:Text xml:lang="en">Bad format</env:Text></env:Reason>
              </env:Fault></env:Body>
            </env:Envelope>"#;

        assert_eq!(
            decode("RetrieveDocument", xml).expect("decodes"),
            Body::Fault {
                code: "env:Sender".to_owned(),
                reason: "Bad format".to_owned(),
            }
        );
    }

    #[test]
    fn decode_rejects_non_soap_documents() {
        let err = decode("LogIn", "<html><body>gateway</body></html>").unwrap_err();
        assert_eq!(err.kind(), Kind::Remote);

        let err = decode("LogIn", "<soap:Envelope><soap:Body>").unwrap_err();
        assert_eq!(err.kind(), Kind::Remote);
    }
}
