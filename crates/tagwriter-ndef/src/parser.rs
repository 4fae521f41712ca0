pub mod stream;

use stream::Stream;
use winnow::{
    ModalResult, Parser,
    binary::{
        Endianness, be_u8, be_u16,
        bits::{bits, bool as take_bool, take as take_bits},
    },
    combinator::peek,
    error::{ContextError, ErrMode},
    token::{any, literal, take},
};

use crate::{
    LONG_LENGTH_MARKER, NDEF_MESSAGE_TLV, TERMINATOR_TLV,
    header::NdefHeader,
    message_info::MessageInfo,
    ndef_type::NdefType,
    payload::{RecordPayload, TEXT_RECORD_TYPE, TextPayload, TextPayloadFormat},
    record::NdefRecord,
};

const MESSAGE_BEGIN_FLAG: u8 = 0b1000_0000;

/// NDEF message TLV followed by the terminator TLV
pub fn parse_tlv_message(input: &mut Stream<'_>) -> ModalResult<Vec<NdefRecord>> {
    let info = parse_message_info.parse_next(input)?;
    let records = parse_ndef_records(input, &info)?;
    let _ = literal([TERMINATOR_TLV]).parse_next(input)?;

    Ok(records)
}

pub fn parse_message_info(input: &mut Stream<'_>) -> ModalResult<MessageInfo> {
    let _ = literal([NDEF_MESSAGE_TLV]).parse_next(input)?;

    let length_indicator = be_u8.parse_next(input)?;
    if length_indicator != LONG_LENGTH_MARKER {
        return Ok(MessageInfo::short(length_indicator));
    }

    // a record header opens with MB set, a long form length on a type 2 tag stays below 0x8000
    let next: u8 = peek(any).parse_next(input)?;
    if next & MESSAGE_BEGIN_FLAG != 0 {
        return Ok(MessageInfo::short(length_indicator));
    }

    let message_length = be_u16.parse_next(input)?;
    Ok(MessageInfo::long(message_length))
}

pub fn parse_ndef_records(
    input: &mut Stream<'_>,
    info: &MessageInfo,
) -> ModalResult<Vec<NdefRecord>> {
    let mut records = Vec::new();
    let message_length = usize::from(info.message_length);
    let mut total_parsed_bytes = 0;

    while total_parsed_bytes < message_length {
        let input_start_bytes = input.len();
        let record = parse_ndef_record.parse_next(input)?;
        records.push(record);

        total_parsed_bytes += input_start_bytes - input.len();
    }

    // a record ran past the length in the TLV header
    if total_parsed_bytes != message_length {
        return Err(ErrMode::Cut(ContextError::new()));
    }

    Ok(records)
}

pub fn parse_ndef_record(input: &mut Stream<'_>) -> ModalResult<NdefRecord> {
    let header = parse_header.parse_next(input)?;
    let type_ = parse_type(input, header.type_length)?;
    let id = parse_id(input, header.id_length)?;
    let payload = parse_payload(input, header.payload_length, &type_)?;

    Ok(NdefRecord {
        header,
        type_,
        id,
        payload,
    })
}

// private
fn parse_header_byte(input: &mut Stream<'_>) -> ModalResult<(bool, bool, bool, bool, bool, u8)> {
    bits::<_, _, ErrMode<ContextError>, _, _>((
        take_bool,
        take_bool,
        take_bool,
        take_bool,
        take_bool,
        take_bits(3_u8),
    ))
    .parse_next(input)
}

fn parse_header(input: &mut Stream<'_>) -> ModalResult<NdefHeader> {
    let (message_begin, message_end, chunked, short_record, has_id_length, type_name_format) =
        parse_header_byte(input)?;

    let type_length = winnow::binary::u8.parse_next(input)?;
    let type_name_format = NdefType::from_tnf(type_name_format);

    let payload_length = if short_record {
        any.map(|x: u8| x as u32).parse_next(input)?
    } else {
        winnow::binary::u32(Endianness::Big).parse_next(input)?
    };

    let id_length = if has_id_length {
        Some(any.parse_next(input)?)
    } else {
        None
    };

    Ok(NdefHeader {
        message_begin,
        message_end,
        chunked,
        short_record,
        has_id_length,
        type_name_format,
        type_length,
        payload_length,
        id_length,
    })
}

fn parse_type(input: &mut Stream<'_>, type_length: u8) -> ModalResult<Vec<u8>> {
    take(type_length as usize)
        .map(|s: &[u8]| s.to_vec())
        .parse_next(input)
}

fn parse_id(input: &mut Stream<'_>, id_length: Option<u8>) -> ModalResult<Option<Vec<u8>>> {
    if let Some(id_len) = id_length {
        take(id_len as usize)
            .map(|s: &[u8]| Some(s.to_vec()))
            .parse_next(input)
    } else {
        Ok(None)
    }
}

fn parse_payload(
    input: &mut Stream<'_>,
    payload_length: u32,
    type_: &[u8],
) -> ModalResult<RecordPayload> {
    if type_ != TEXT_RECORD_TYPE {
        return take(payload_length as usize)
            .map(|s: &[u8]| RecordPayload::Data(s.to_vec()))
            .parse_next(input);
    }

    // bit 6 is reserved
    let (is_utf16, _, language_code_length): (bool, bool, u8) =
        bits::<_, _, ErrMode<ContextError>, _, _>((take_bool, take_bool, take_bits(6_u8)))
            .parse_next(input)?;

    let Some(remaining_length) = payload_length.checked_sub(u32::from(language_code_length) + 1)
    else {
        return Err(ErrMode::Cut(ContextError::new()));
    };

    let language_code = take(language_code_length as usize).parse_next(input)?;
    let text = take(remaining_length as usize).parse_next(input)?;

    let parsed_text = if is_utf16 {
        String::from_utf16_lossy(
            &text
                .chunks_exact(2)
                .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
                .collect::<Vec<u16>>(),
        )
    } else {
        String::from_utf8_lossy(text).to_string()
    };

    Ok(RecordPayload::Text(TextPayload {
        format: if is_utf16 {
            TextPayloadFormat::Utf16
        } else {
            TextPayloadFormat::Utf8
        },
        language: String::from_utf8_lossy(language_code).to_string(),
        text: parsed_text,
    }))
}
