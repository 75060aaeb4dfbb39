use jieba_ffi::{Hmm, Jieba, TokenizeMode};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Uses JIEBA_LIBRARY_PATH and JIEBA_DICT_DIR when set.
    let jieba = Jieba::new()?;

    let text = "小明硕士毕业于中国科学院计算所，后在日本京都大学深造";
    println!("cut:        {}", jieba.cut(text, Hmm::Enabled)?.join("/"));
    println!("cut_all:    {}", jieba.cut_all(text)?.join("/"));
    println!("for search: {}", jieba.cut_for_search(text, Hmm::Enabled)?.join("/"));

    for tag in jieba.tag(text)? {
        print!("{}/{} ", tag.word, tag.tag);
    }
    println!();

    for word in jieba.tokenize(text, TokenizeMode::Search, Hmm::Enabled)? {
        println!("{} [{}, {})", word.word, word.start, word.end);
    }

    for keyword in jieba.extract_keywords_weighted(text, 5)? {
        println!("{} {:.3}", keyword.word, keyword.weight);
    }

    jieba.free();
    Ok(())
}
