//! Reference data
//!
//! Ordered option lists offered by the profile editor. Submitted values are
//! checked against these lists.

use serde::Serialize;

/// A selectable option: the stored value and its display label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefOption {
    pub value: &'static str,
    pub label: &'static str,
}

impl RefOption {
    const fn new(value: &'static str, label: &'static str) -> Self {
        Self { value, label }
    }
}

/// Academic degrees and professional certifications
pub static QUALIFICATIONS: &[RefOption] = &[
    // Doctoral Degrees
    RefOption::new("PhD", "Doctor of Philosophy (PhD)"),
    RefOption::new("EdD", "Doctor of Education (EdD)"),
    RefOption::new("PsyD", "Doctor of Psychology (PsyD)"),
    RefOption::new("DNP", "Doctor of Nursing Practice (DNP)"),
    RefOption::new("DBA", "Doctor of Business Administration (DBA)"),
    RefOption::new("JD", "Juris Doctor (JD)"),
    RefOption::new("MD", "Doctor of Medicine (MD)"),
    RefOption::new("DO", "Doctor of Osteopathic Medicine (DO)"),
    RefOption::new("DDS", "Doctor of Dental Surgery (DDS)"),
    RefOption::new("DMD", "Doctor of Dental Medicine (DMD)"),
    RefOption::new("DVM", "Doctor of Veterinary Medicine (DVM)"),
    RefOption::new("PharmD", "Doctor of Pharmacy (PharmD)"),

    // Master's Degrees
    RefOption::new("MA", "Master of Arts (MA)"),
    RefOption::new("MS", "Master of Science (MS)"),
    RefOption::new("MBA", "Master of Business Administration (MBA)"),
    RefOption::new("MEd", "Master of Education (MEd)"),
    RefOption::new("MFA", "Master of Fine Arts (MFA)"),
    RefOption::new("MPA", "Master of Public Administration (MPA)"),
    RefOption::new("MPH", "Master of Public Health (MPH)"),
    RefOption::new("MSW", "Master of Social Work (MSW)"),
    RefOption::new("LLM", "Master of Laws (LLM)"),
    RefOption::new("MEng", "Master of Engineering (MEng)"),
    RefOption::new("MDS", "Master of Dental Surgery (MDS)"),

    // Bachelor's Degrees
    RefOption::new("BA", "Bachelor of Arts (BA)"),
    RefOption::new("BS", "Bachelor of Science (BS)"),
    RefOption::new("BFA", "Bachelor of Fine Arts (BFA)"),
    RefOption::new("BBA", "Bachelor of Business Administration (BBA)"),
    RefOption::new("BEng", "Bachelor of Engineering (BEng)"),
    RefOption::new("BScN", "Bachelor of Science in Nursing (BScN)"),
    RefOption::new("BDS", "Bachelor of Dental Surgery (BDS)"),

    // Associate Degrees
    RefOption::new("AA", "Associate of Arts (AA)"),
    RefOption::new("AS", "Associate of Science (AS)"),
    RefOption::new("AAS", "Associate of Applied Science (AAS)"),

    // Professional Certifications
    RefOption::new("CPA", "Certified Public Accountant (CPA)"),
    RefOption::new("PMP", "Project Management Professional (PMP)"),
    RefOption::new("PE", "Professional Engineer (PE)"),
    RefOption::new("RN", "Registered Nurse (RN)"),
    RefOption::new("CISSP", "Certified Information Systems Security Professional (CISSP)"),
    RefOption::new("SHRM-CP", "SHRM Certified Professional (SHRM-CP)"),
    RefOption::new("CFA", "Chartered Financial Analyst (CFA)"),
    RefOption::new("CFP", "Certified Financial Planner (CFP)"),
    RefOption::new("RDH", "Registered Dental Hygienist (RDH)"),
    RefOption::new("CDA", "Certified Dental Assistant (CDA)"),

    // Dental Specific Certificates
    RefOption::new("Cert-Ortho", "Certificate in Orthodontics"),
    RefOption::new("Cert-Perio", "Certificate in Periodontics"),
    RefOption::new("Cert-Endo", "Certificate in Endodontics"),
    RefOption::new("Cert-Prostho", "Certificate in Prosthodontics"),
    RefOption::new("Cert-Pedo", "Certificate in Pediatric Dentistry"),
    RefOption::new("Cert-OMFS", "Certificate in Oral and Maxillofacial Surgery"),
];

/// Occupations
pub static PROFESSIONS: &[RefOption] = &[
    // Healthcare
    RefOption::new("physician", "Physician / Doctor"),
    RefOption::new("nurse", "Nurse"),
    RefOption::new("dentist", "Dentist"),
    RefOption::new("pharmacist", "Pharmacist"),
    RefOption::new("therapist", "Therapist"),
    RefOption::new("medical-technologist", "Medical Technologist"),
    RefOption::new("researcher", "Researcher"),
    RefOption::new("veterinarian", "Veterinarian"),
    RefOption::new("optometrist", "Optometrist"),

    // Technology
    RefOption::new("software-developer", "Software Developer / Engineer"),
    RefOption::new("data-scientist", "Data Scientist"),
    RefOption::new("it-specialist", "IT Specialist"),
    RefOption::new("ux-ui-designer", "UX/UI Designer"),
    RefOption::new("systems-analyst", "Systems Analyst"),
    RefOption::new("network-administrator", "Network Administrator"),
    RefOption::new("cybersecurity-analyst", "Cybersecurity Analyst"),

    // Business & Finance
    RefOption::new("accountant", "Accountant"),
    RefOption::new("financial-analyst", "Financial Analyst"),
    RefOption::new("management-consultant", "Management Consultant"),
    RefOption::new("human-resources-manager", "Human Resources Manager"),
    RefOption::new("marketing-manager", "Marketing Manager"),
    RefOption::new("sales-manager", "Sales Manager"),
    RefOption::new("project-manager", "Project Manager"),

    // Education
    RefOption::new("teacher", "Teacher / Educator"),
    RefOption::new("professor", "Professor / Lecturer"),
    RefOption::new("school-administrator", "School Administrator"),
    RefOption::new("librarian", "Librarian"),
    RefOption::new("instructional-designer", "Instructional Designer"),

    // Legal
    RefOption::new("lawyer", "Lawyer / Attorney"),
    RefOption::new("paralegal", "Paralegal"),
    RefOption::new("judge", "Judge"),

    // Arts, Design & Media
    RefOption::new("graphic-designer", "Graphic Designer"),
    RefOption::new("writer", "Writer / Author"),
    RefOption::new("editor", "Editor"),
    RefOption::new("journalist", "Journalist"),
    RefOption::new("photographer", "Photographer"),
    RefOption::new("musician", "Musician"),
    RefOption::new("architect", "Architect"),

    // Skilled Trades & Engineering
    RefOption::new("civil-engineer", "Civil Engineer"),
    RefOption::new("mechanical-engineer", "Mechanical Engineer"),
    RefOption::new("electrical-engineer", "Electrical Engineer"),
    RefOption::new("electrician", "Electrician"),
    RefOption::new("plumber", "Plumber"),
    RefOption::new("carpenter", "Carpenter"),

    // Other
    RefOption::new("scientist", "Scientist"),
    RefOption::new("student", "Student"),
    RefOption::new("other", "Other"),
];

/// Label for a qualification value, or the value itself when unknown
pub fn qualification_label(value: &str) -> &str {
    label_for(QUALIFICATIONS, value)
}

/// Label for a profession value, or the value itself when unknown
pub fn profession_label(value: &str) -> &str {
    label_for(PROFESSIONS, value)
}

fn label_for<'a>(options: &'static [RefOption], value: &'a str) -> &'a str {
    options
        .iter()
        .find(|o| o.value == value)
        .map(|o| o.label)
        .unwrap_or(value)
}

pub fn is_qualification(value: &str) -> bool {
    QUALIFICATIONS.iter().any(|o| o.value == value)
}

pub fn is_profession(value: &str) -> bool {
    PROFESSIONS.iter().any(|o| o.value == value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_known_labels() {
        assert_eq!(qualification_label("DDS"), "Doctor of Dental Surgery (DDS)");
        assert_eq!(profession_label("dentist"), "Dentist");
        assert_eq!(profession_label("software-developer"), "Software Developer / Engineer");
    }

    #[test]
    fn test_unknown_value_falls_back_to_itself() {
        assert_eq!(qualification_label("Astronaut"), "Astronaut");
        assert_eq!(profession_label(""), "");
    }

    #[test]
    fn test_values_are_unique() {
        let q: HashSet<_> = QUALIFICATIONS.iter().map(|o| o.value).collect();
        let p: HashSet<_> = PROFESSIONS.iter().map(|o| o.value).collect();
        assert_eq!(q.len(), QUALIFICATIONS.len());
        assert_eq!(p.len(), PROFESSIONS.len());
    }

    #[test]
    fn test_order_is_preserved() {
        assert_eq!(QUALIFICATIONS[0].value, "PhD");
        assert_eq!(PROFESSIONS[0].value, "physician");
        assert_eq!(PROFESSIONS.last().map(|o| o.value), Some("other"));
    }

    #[test]
    fn test_membership() {
        assert!(is_qualification("Cert-Ortho"));
        assert!(!is_qualification("cert-ortho"));
        assert!(is_profession("other"));
        assert!(!is_profession("DDS"));
    }
}
